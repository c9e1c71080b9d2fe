use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Order,
    Promotion,
    Security,
    #[default]
    General,
}

/// An in-app message. Nothing is pushed; users read them from their inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub notification_type: NotificationType,
}

impl Notification {
    pub fn new(new: NewNotification) -> CoreResult<Self> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::ValidationError("The title field must be set".into()));
        }
        let message = new.message.trim().to_string();
        if message.is_empty() {
            return Err(CoreError::ValidationError("The message field must be set".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title,
            message,
            notification_type: new.notification_type,
            is_read: false,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_defaults_to_general() {
        let new: NewNotification = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::new_v4(),
            "title": "Welcome",
            "message": "Thanks for joining"
        }))
        .unwrap();
        let n = Notification::new(new).unwrap();
        assert_eq!(n.notification_type, NotificationType::General);
        assert!(!n.is_read);
    }

    #[test]
    fn test_blank_message_rejected() {
        let new = NewNotification {
            user_id: Uuid::new_v4(),
            title: "Order shipped".into(),
            message: " ".into(),
            notification_type: NotificationType::Order,
        };
        assert!(matches!(Notification::new(new), Err(CoreError::ValidationError(_))));
    }
}
