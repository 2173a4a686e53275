use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::game::{InboundEvent, InboundKind};
use crate::transport::{Button, ChatTransport};
use crate::types::{ChatId, MessageId, Player, UserId};

const API_BASE: &str = "https://api.telegram.org";
/// Upper bound on any single Bot API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ─── Webhook payloads ─────────────────────────────────────────────

/// The subset of a Telegram update the bot reacts to.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl Update {
    /// Converts the update into a game event, if it carries one.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(message) = self.message {
            let from = message.from.filter(|u| !u.is_bot)?;
            return Some(InboundEvent {
                chat_id: message.chat.id,
                player: Player::new(from.id, from.first_name),
                kind: InboundKind::Text(message.text?),
            });
        }

        let query = self.callback_query?;
        Some(InboundEvent {
            chat_id: query.message?.chat.id,
            player: Player::new(query.from.id, query.from.first_name),
            kind: InboundKind::Button {
                tag: query.data.unwrap_or_default(),
                callback_id: query.id,
            },
        })
    }
}

// ─── Bot API client ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: MessageId,
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

/// Telegram Bot API transport.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", API_BASE, token),
        })
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &B,
    ) -> Result<Option<T>, TransportError> {
        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(TransportError::Api {
                method,
                description: response.description.unwrap_or_default(),
            });
        }
        Ok(response.result)
    }

    /// Points Telegram at our webhook route.
    pub async fn set_webhook(&self, url: &str) -> Result<(), TransportError> {
        self.call::<_, bool>("setWebhook", &serde_json::json!({ "url": url }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        button: Option<&Button>,
    ) -> Result<MessageId, TransportError> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            reply_markup: button.map(|b| InlineKeyboard {
                inline_keyboard: vec![vec![InlineButton {
                    text: &b.label,
                    callback_data: &b.tag,
                }]],
            }),
        };

        let sent: Option<SentMessage> = self.call("sendMessage", &body).await?;
        sent.map(|m| m.message_id).ok_or(TransportError::Api {
            method: "sendMessage",
            description: "missing message in response".to_string(),
        })
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError> {
        let body = serde_json::json!({ "chat_id": chat_id, "message_id": message_id });
        self.call::<_, bool>("deleteMessage", &body).await.map(|_| ())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        self.call::<_, bool>("answerCallbackQuery", &body).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NEW_ROUND_TAG;

    fn parse(json: serde_json::Value) -> Option<InboundEvent> {
        serde_json::from_value::<Update>(json).unwrap().into_event()
    }

    #[test]
    fn text_messages_become_guesses() {
        let event = parse(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 44,
                "chat": { "id": -1001, "type": "supergroup" },
                "from": { "id": 7, "first_name": "Ana", "is_bot": false },
                "text": "a"
            }
        }));

        assert_eq!(
            event,
            Some(InboundEvent {
                chat_id: -1001,
                player: Player::new(7, "Ana"),
                kind: InboundKind::Text("a".to_string()),
            })
        );
    }

    #[test]
    fn button_clicks_carry_their_tag() {
        let event = parse(serde_json::json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-9",
                "from": { "id": 8, "first_name": "Bia" },
                "message": { "message_id": 50, "chat": { "id": -1001 } },
                "data": NEW_ROUND_TAG
            }
        }))
        .unwrap();

        assert_eq!(event.chat_id, -1001);
        assert_eq!(
            event.kind,
            InboundKind::Button {
                tag: NEW_ROUND_TAG.to_string(),
                callback_id: "cb-9".to_string(),
            }
        );
    }

    #[test]
    fn stickers_and_bots_are_skipped() {
        assert!(parse(serde_json::json!({
            "update_id": 3,
            "message": {
                "message_id": 45,
                "chat": { "id": 1 },
                "from": { "id": 7, "first_name": "Ana" }
            }
        }))
        .is_none());

        assert!(parse(serde_json::json!({
            "update_id": 4,
            "message": {
                "message_id": 46,
                "chat": { "id": 1 },
                "from": { "id": 9, "first_name": "OtherBot", "is_bot": true },
                "text": "x"
            }
        }))
        .is_none());
    }

    fn decode<T: DeserializeOwned>(json: serde_json::Value) -> ApiResponse<T> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn api_errors_decode_without_a_result() {
        let response: ApiResponse<SentMessage> = decode(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }));
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.description.as_deref(), Some("Bad Request: chat not found"));

        let response: ApiResponse<SentMessage> = decode(serde_json::json!({
            "ok": true,
            "result": { "message_id": 77, "chat": { "id": 1 } }
        }));
        assert_eq!(response.result.map(|m| m.message_id), Some(77));
    }

    #[test]
    fn client_builds_with_a_request_timeout() {
        let client = TelegramClient::new("123:abc").unwrap();
        assert_eq!(client.base_url, "https://api.telegram.org/bot123:abc");
    }

    #[test]
    fn keyboard_serializes_as_inline_markup() {
        let body = SendMessage {
            chat_id: 1,
            text: "hi",
            parse_mode: "HTML",
            reply_markup: Some(InlineKeyboard {
                inline_keyboard: vec![vec![InlineButton {
                    text: "New round",
                    callback_data: NEW_ROUND_TAG,
                }]],
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["reply_markup"]["inline_keyboard"][0][0]["callback_data"], NEW_ROUND_TAG);
    }
}
