/// Arrival push message
///
/// Builds the transport-neutral message sent when a rider reaches the
/// customer, and maps it onto the FCM v1 wire format.
use courier_fcm_shared::{
    AndroidConfig, AndroidNotification, ApnsConfig, ApnsPayload, Aps, ApsAlert,
    FcmMessageContent, FcmNotification,
};
use std::collections::BTreeMap;

use crate::config::NotificationConfig;

pub const ARRIVAL_TITLE: &str = "Your food is arriving! 🚴‍♂️";
pub const ARRIVAL_BODY: &str = "Rider is near your location. Get ready to receive your order.";
pub const ARRIVAL_TYPE: &str = "arrival";
/// Lets the Flutter client route the tap to the order screen
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";
pub const DEFAULT_SOUND: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndroidPriority {
    Normal,
    High,
}

impl AndroidPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidPriority::Normal => "normal",
            AndroidPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidHints {
    pub priority: AndroidPriority,
    pub channel_id: Option<String>,
}

impl AndroidHints {
    pub fn to_fcm(&self) -> AndroidConfig {
        AndroidConfig {
            priority: Some(self.priority.as_str().to_string()),
            notification: self.channel_id.as_ref().map(|channel_id| AndroidNotification {
                channel_id: Some(channel_id.clone()),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnsHints {
    /// Wake the app for background handling even if the alert is suppressed
    pub content_available: bool,
    pub alert: Option<NotificationContent>,
    pub sound: Option<String>,
}

impl ApnsHints {
    pub fn to_fcm(&self) -> ApnsConfig {
        ApnsConfig {
            headers: BTreeMap::new(),
            payload: ApnsPayload {
                aps: Aps {
                    content_available: self.content_available.then_some(1),
                    alert: self.alert.as_ref().map(|alert| ApsAlert {
                        title: alert.title.clone(),
                        body: alert.body.clone(),
                    }),
                    sound: self.sound.clone(),
                },
            },
        }
    }
}

/// Per-platform delivery hints; either side may be left out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformHints {
    pub android: Option<AndroidHints>,
    pub apns: Option<ApnsHints>,
}

/// A message addressed to one device token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub notification: NotificationContent,
    pub data: BTreeMap<String, String>,
    pub hints: PlatformHints,
}

impl PushMessage {
    pub fn to_fcm(&self) -> FcmMessageContent {
        FcmMessageContent {
            token: self.token.clone(),
            notification: Some(FcmNotification {
                title: self.notification.title.clone(),
                body: self.notification.body.clone(),
            }),
            data: (!self.data.is_empty()).then(|| self.data.clone()),
            android: self.hints.android.as_ref().map(AndroidHints::to_fcm),
            apns: self.hints.apns.as_ref().map(ApnsHints::to_fcm),
        }
    }
}

/// Build the "rider is arriving" message for an order
pub fn arrival_message(order_id: &str, token: &str, config: &NotificationConfig) -> PushMessage {
    let content = NotificationContent {
        title: ARRIVAL_TITLE.to_string(),
        body: ARRIVAL_BODY.to_string(),
    };

    let mut data = BTreeMap::new();
    data.insert("type".to_string(), ARRIVAL_TYPE.to_string());
    data.insert("orderId".to_string(), order_id.to_string());
    data.insert("click_action".to_string(), CLICK_ACTION.to_string());

    PushMessage {
        token: token.to_string(),
        notification: content.clone(),
        data,
        hints: PlatformHints {
            android: Some(AndroidHints {
                priority: AndroidPriority::High,
                channel_id: Some(config.arrival_channel_id.clone()),
            }),
            apns: Some(ApnsHints {
                content_available: true,
                alert: Some(content),
                sound: Some(DEFAULT_SOUND.to_string()),
            }),
        },
    }
}
