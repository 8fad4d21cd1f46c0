//! 更新处理
//!
//! [`classify_update`] 把原始更新归类为 [`Incoming`]，[`BotHandlers`] 负责执行。

use super::phone::{extract_phone, mask_phone, normalize_phone};
use crate::channel::BotChannel;
use crate::channel::telegram::Update;
use crate::navigation::{ControlPayload, Navigator};
use crate::session::SessionError;
use crate::source::AccountResolver;
use crate::store::AccountDirectory;
use shared::{ChatId, MessageRef};
use std::sync::Arc;

pub const CONTACT_BUTTON: &str = "Отправить номер телефона";

pub const GREETING: &str = "👋 Привет! Отправь свой номер телефона кнопкой ниже, чтобы получить информацию о заказах.\n\
После авторизации можно в любой момент вызвать /orders и обновить статусы.";

pub const HELP: &str = "ℹ️ Доступные команды:\n\
• /start — авторизация по номеру телефона.\n\
• /orders — получить актуальные статусы заказов после авторизации.\n\
Также вы можете просто отправить свой номер телефоном или текстом, чтобы авторизоваться.";

pub const PHONE_UNRECOGNIZED: &str = "❌ Не удалось распознать номер телефона.";
pub const USER_NOT_FOUND: &str = "❌ Пользователь не найден.";
pub const FOREIGN_CONTACT: &str = "❌ Отправьте, пожалуйста, свой собственный контакт.";
pub const NOT_AUTHORIZED: &str =
    "⚠️ Я не знаю ваш номер телефона. Отправьте контакт через /start, чтобы авторизоваться.";
pub const LOAD_FAILED: &str = "⚠️ Не удалось загрузить заказы. Попробуйте позже.";
pub const INTERNAL_ERROR: &str = "⚠️ Произошла ошибка. Попробуйте позже.";
pub const ACK_STALE_CONTROL: &str = "Кнопка устарела, откройте /orders";

/// 归类后的更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Start { chat: ChatId },
    Help { chat: ChatId },
    Orders { chat: ChatId },
    /// 分享的联系人；`own = false` 表示分享的是别人的联系人
    Contact { chat: ChatId, phone: String, own: bool },
    /// 非命令文本，可能包含手机号
    Text { chat: ChatId, text: String },
    Callback {
        chat: ChatId,
        callback_id: String,
        origin: Option<MessageRef>,
        data: String,
    },
    /// 未知命令、无 chat 的回调等
    Ignored,
}

/// 命令名：去掉 `/` 前缀和 `@botname` 后缀
fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    Some(command.split('@').next().unwrap_or(command))
}

pub fn classify_update(update: &Update) -> Incoming {
    if let Some(query) = &update.callback_query {
        let Some(message) = &query.message else {
            return Incoming::Ignored;
        };
        return Incoming::Callback {
            chat: ChatId(message.chat.id),
            callback_id: query.id.clone(),
            origin: Some(MessageRef(message.message_id)),
            data: query.data.clone().unwrap_or_default(),
        };
    }

    let Some(message) = &update.message else {
        return Incoming::Ignored;
    };
    let chat = ChatId(message.chat.id);

    if let Some(contact) = &message.contact {
        let sender = message.from.as_ref().map(|u| u.id);
        let own = match (contact.user_id, sender) {
            (Some(owner), Some(sender)) => owner == sender,
            _ => true,
        };
        return Incoming::Contact {
            chat,
            phone: contact.phone_number.clone(),
            own,
        };
    }

    let Some(text) = message.text.as_deref() else {
        return Incoming::Ignored;
    };
    match command_name(text) {
        Some("start") => Incoming::Start { chat },
        Some("help") => Incoming::Help { chat },
        Some("orders") => Incoming::Orders { chat },
        Some(_) => Incoming::Ignored,
        None => Incoming::Text {
            chat,
            text: text.to_string(),
        },
    }
}

/// 会话错误 → 用户可见提示
pub fn user_message(error: &SessionError) -> &'static str {
    match error {
        SessionError::NotAuthorized => NOT_AUTHORIZED,
        SessionError::Source(_) => LOAD_FAILED,
        SessionError::Storage(_) | SessionError::Channel(_) => INTERNAL_ERROR,
    }
}

/// 回调应答的短提示（最多 200 字符）
fn ack_message(error: &SessionError) -> &'static str {
    match error {
        SessionError::NotAuthorized => "Сначала авторизуйтесь через /start",
        SessionError::Source(_) => "Не удалось загрузить заказы",
        SessionError::Storage(_) | SessionError::Channel(_) => "Произошла ошибка",
    }
}

fn authorized_text(name: &str, balance: &str, debt: &str) -> String {
    format!(
        "✅ Авторизация прошла успешно!\n👤 {name}\n💰 Баланс: {balance} ₽\n💸 Задолженность: {debt} ₽"
    )
}

pub struct BotHandlers {
    channel: Arc<dyn BotChannel>,
    resolver: Arc<dyn AccountResolver>,
    accounts: Arc<dyn AccountDirectory>,
    navigator: Arc<Navigator>,
}

impl BotHandlers {
    pub fn new(
        channel: Arc<dyn BotChannel>,
        resolver: Arc<dyn AccountResolver>,
        accounts: Arc<dyn AccountDirectory>,
        navigator: Arc<Navigator>,
    ) -> Self {
        Self {
            channel,
            resolver,
            accounts,
            navigator,
        }
    }

    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        match classify_update(&update) {
            Incoming::Start { chat } => {
                if let Err(e) = self
                    .channel
                    .send_contact_request(chat, GREETING, CONTACT_BUTTON)
                    .await
                {
                    tracing::warn!(chat_id = %chat, error = %e, "Failed to send greeting");
                }
            }
            Incoming::Help { chat } => self.reply(chat, HELP).await,
            Incoming::Orders { chat } => self.open_orders(chat).await,
            Incoming::Contact { chat, own: false, .. } => {
                tracing::warn!(chat_id = %chat, "Foreign contact rejected");
                self.reply(chat, FOREIGN_CONTACT).await;
            }
            Incoming::Contact { chat, phone, .. } => {
                self.authorize(chat, normalize_phone(&phone)).await
            }
            Incoming::Text { chat, text } => self.authorize(chat, extract_phone(&text)).await,
            Incoming::Callback {
                chat,
                callback_id,
                origin,
                data,
            } => self.handle_callback(chat, &callback_id, origin, &data).await,
            Incoming::Ignored => {
                tracing::debug!(update_id, "Update ignored");
            }
        }
    }

    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.channel.send(chat, text, None).await {
            tracing::warn!(chat_id = %chat, error = %e, "Failed to send reply");
        }
    }

    async fn open_orders(&self, chat: ChatId) {
        if let Err(e) = self.navigator.open(chat).await {
            tracing::warn!(chat_id = %chat, error = %e, "Failed to open orders");
            self.reply(chat, user_message(&e)).await;
        }
    }

    /// 手机号 → 账户 → 绑定 → 新的概览
    async fn authorize(&self, chat: ChatId, phone: Option<String>) {
        let Some(phone) = phone else {
            self.reply(chat, PHONE_UNRECOGNIZED).await;
            return;
        };
        tracing::info!(chat_id = %chat, phone = %mask_phone(&phone), "Authorizing phone");

        let account = match self.resolver.resolve_phone(&phone).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                tracing::info!(chat_id = %chat, phone = %mask_phone(&phone), "Account not found");
                self.reply(chat, USER_NOT_FOUND).await;
                return;
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat, error = %e, "Account lookup failed");
                self.reply(chat, LOAD_FAILED).await;
                return;
            }
        };

        let previous = match self.accounts.bind(chat, &phone, &account.account_id) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::error!(chat_id = %chat, error = %e, "Failed to bind account");
                self.reply(chat, INTERNAL_ERROR).await;
                return;
            }
        };

        // 旧通知的消息引用已在 bind 中清除
        if let Some(previous) = previous
            && previous.account_id != account.account_id
        {
            tracing::info!(
                chat_id = %chat,
                previous_account_id = %previous.account_id,
                "Chat binding replaced"
            );
        }

        self.navigator.reset(chat).await;
        tracing::info!(
            chat_id = %chat,
            account_id = %account.account_id,
            name = %account.name,
            "Account authorized"
        );

        let greeting = self
            .channel
            .send_removing_reply_keyboard(
                chat,
                &authorized_text(&account.name, &account.balance, &account.debt),
            )
            .await;
        if let Err(e) = &greeting {
            tracing::warn!(chat_id = %chat, error = %e, "Failed to send authorization message");
        }

        self.open_orders(chat).await;
        if let Ok(message) = greeting {
            self.navigator.note_menu_message(chat, message).await;
        }
    }

    async fn handle_callback(
        &self,
        chat: ChatId,
        callback_id: &str,
        origin: Option<MessageRef>,
        data: &str,
    ) {
        let ack = match ControlPayload::parse(data) {
            Ok(payload) => match self.navigator.handle(chat, origin, &payload).await {
                Ok(outcome) => outcome.ack,
                Err(e) => {
                    tracing::warn!(chat_id = %chat, payload = %payload, error = %e, "Control failed");
                    if matches!(e, SessionError::Source(_)) {
                        self.reply(chat, LOAD_FAILED).await;
                    }
                    Some(ack_message(&e).to_string())
                }
            },
            Err(e) => {
                tracing::debug!(chat_id = %chat, data = %data, error = %e, "Unparseable control payload");
                Some(ACK_STALE_CONTROL.to_string())
            }
        };

        if let Err(e) = self
            .channel
            .answer_callback_query(callback_id, ack.as_deref())
            .await
        {
            tracing::debug!(chat_id = %chat, error = %e, "Failed to answer callback query");
        }
    }
}
