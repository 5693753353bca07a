/// Courier FCM Shared Library
///
/// This library provides the Firebase Cloud Messaging (FCM) HTTP v1 client
/// used by the Courier backend to deliver push notifications to Android and
/// iOS devices.
///
/// It handles:
/// - OAuth2 access tokens minted from a Google service account
/// - Token caching with automatic refresh
/// - Single-device message delivery with Android and APNs overrides
/// - Classification of FCM error responses
pub mod auth;
pub mod client;
pub mod errors;
pub mod models;

pub use auth::{AccessTokenProvider, ServiceAccountAuth, StaticToken};
pub use client::FCMClient;
pub use errors::FCMError;
pub use models::{
    AndroidConfig, AndroidNotification, ApnsConfig, ApnsPayload, Aps, ApsAlert, FCMSendResult,
    FcmMessageContent, FcmNotification, ServiceAccountKey,
};
