//! Long-polling transport: teloxide dispatcher feeding the core dispatcher.

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use txr_core::{
    dispatcher::EventDispatcher,
    domain::{EventKind, InboundEvent, Sender},
};

use crate::{wire::build_event, TelegramMessenger};

/// Poll with the token from the current snapshot until the process is stopped.
///
/// The polling connection keeps the token it started with; replies follow
/// token rotation through the messenger.
pub async fn run_polling(
    dispatcher: Arc<EventDispatcher>,
    messenger: Arc<TelegramMessenger>,
) -> anyhow::Result<()> {
    let bot = messenger.bot().await?;

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "polling started"),
        Err(e) => tracing::warn!(error = %e, "getMe failed; polling anyway"),
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_edited_message().endpoint(on_edited_message))
        .branch(Update::filter_channel_post().endpoint(on_channel_post))
        .branch(Update::filter_edited_channel_post().endpoint(on_edited_channel_post));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .default_handler(|_| async {
            tracing::debug!("ignoring unhandled update type");
        })
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn on_message(msg: Message, dispatcher: Arc<EventDispatcher>) -> ResponseResult<()> {
    forward(&dispatcher, EventKind::Message, &msg).await
}

async fn on_edited_message(msg: Message, dispatcher: Arc<EventDispatcher>) -> ResponseResult<()> {
    forward(&dispatcher, EventKind::EditedMessage, &msg).await
}

async fn on_channel_post(msg: Message, dispatcher: Arc<EventDispatcher>) -> ResponseResult<()> {
    forward(&dispatcher, EventKind::ChannelPost, &msg).await
}

async fn on_edited_channel_post(
    msg: Message,
    dispatcher: Arc<EventDispatcher>,
) -> ResponseResult<()> {
    forward(&dispatcher, EventKind::EditedChannelPost, &msg).await
}

async fn forward(
    dispatcher: &EventDispatcher,
    kind: EventKind,
    msg: &Message,
) -> ResponseResult<()> {
    dispatcher.handle_event(event_from_message(kind, msg)).await;
    Ok(())
}

pub fn event_from_message(kind: EventKind, msg: &Message) -> InboundEvent {
    let sender = msg
        .from()
        .map(|u| Sender {
            id: i64::try_from(u.id.0).ok(),
            username: u.username.clone(),
            first_name: Some(u.first_name.clone()),
            last_name: u.last_name.clone(),
        })
        .unwrap_or_default();

    build_event(
        kind,
        msg.chat.id.0,
        msg.text().map(str::to_string),
        sender,
        msg.migrate_to_chat_id().map(|id| id.0),
    )
}
