//! Telegram transport: maps updates onto engine inputs and renders replies.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message,
};
use tracing::{error, info};

use fitcoach_core::types::ProfileField;

use crate::client::ApiClient;
use crate::dialogue::{Choice, Engine, Input, Reply};
use crate::throttle::Throttle;

/// Telegram rejects messages longer than this.
const MAX_MESSAGE_LENGTH: usize = 4096;

const THROTTLED: &str = "Please slow down — you're sending messages too quickly.";

pub async fn run(bot: Bot, engine: Arc<Engine<ApiClient>>, throttle: Arc<Throttle>) {
    if let Err(err) = bot.set_my_commands(command_menu()).await {
        error!("failed to register command menu: {}", err);
    }

    info!("starting dispatcher");
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine, throttle])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn command_menu() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Create your profile from scratch"),
        BotCommand::new("profile", "Show and edit your profile"),
        BotCommand::new("generate_plan", "Generate a weekly training plan"),
        BotCommand::new("my_plan", "Show your current plan"),
        BotCommand::new("cancel", "Abandon the current dialogue step"),
        BotCommand::new("help", "What this bot can do"),
    ]
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    engine: Arc<Engine<ApiClient>>,
    throttle: Arc<Throttle>,
) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        // channel posts and the like carry no sender
        return Ok(());
    };
    let identity = user.id.0 as i64;

    if !throttle.acquire(identity).await {
        info!(identity, "message rejected by cooldown");
        bot.send_message(msg.chat.id, THROTTLED).await?;
        return Ok(());
    }

    let input = match msg.text() {
        Some(text) => Input::Text(text.to_owned()),
        None => Input::Unsupported,
    };

    let replies = engine.handle(identity, user.username.as_deref(), input).await;
    send_replies(&bot, msg.chat.id, replies).await
}

async fn handle_callback(
    bot: Bot,
    query: CallbackQuery,
    engine: Arc<Engine<ApiClient>>,
) -> ResponseResult<()> {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(data) = query.data else {
        return Ok(());
    };
    let Some(message) = query.message else {
        return Ok(());
    };
    let identity = query.from.id.0 as i64;
    let chat_id = message.chat().id;

    // An `edit:<field>` affordance becomes a field edit; anything else is
    // the literal answer the button stood for.
    let input = match data.strip_prefix("edit:") {
        Some(field) => match field.parse::<ProfileField>() {
            Ok(field) => Input::EditField(field),
            Err(()) => return Ok(()),
        },
        None => Input::Text(data),
    };

    let replies = engine
        .handle(identity, query.from.username.as_deref(), input)
        .await;
    send_replies(&bot, chat_id, replies).await
}

async fn send_replies(bot: &Bot, chat_id: ChatId, replies: Vec<Reply>) -> ResponseResult<()> {
    for reply in replies {
        let chunks = chunk_text(&reply.text);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            if i == last && !reply.choices.is_empty() {
                bot.send_message(chat_id, chunk)
                    .reply_markup(choices_keyboard(&reply.choices))
                    .await?;
            } else {
                bot.send_message(chat_id, chunk).await?;
            }
        }
    }
    Ok(())
}

fn choices_keyboard(choices: &[Choice]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = choices
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|c| InlineKeyboardButton::callback(c.label.clone(), c.data.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Split on line boundaries where possible, hard-split otherwise.
fn chunk_text(text: &str) -> Vec<String> {
    if text.len() <= MAX_MESSAGE_LENGTH {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > MAX_MESSAGE_LENGTH && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() > MAX_MESSAGE_LENGTH {
            let mut rest = line;
            while rest.len() > MAX_MESSAGE_LENGTH {
                let mut cut = MAX_MESSAGE_LENGTH;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                chunks.push(rest[..cut].to_owned());
                rest = &rest[cut..];
            }
            current.push_str(rest);
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hello"), vec!["hello".to_owned()]);
    }

    #[test]
    fn long_text_splits_within_the_limit() {
        let line = "x".repeat(100);
        let text = (0..60).map(|_| line.clone()).collect::<Vec<_>>().join("\n");
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LENGTH));
        let total: usize = chunks.iter().map(String::len).sum();
        assert_eq!(total, text.len());
    }

    #[test]
    fn oversized_single_line_is_hard_split_on_char_boundaries() {
        let text = "ü".repeat(3000);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LENGTH));
        assert_eq!(chunks.concat(), text);
    }
}
