//! The push second factor: registration, device tokens and notifications.

mod device_token;
mod handler;
mod mechanism;
mod notification;
mod parser;

pub(crate) use self::mechanism::{DEFAULT_COMMUNICATION_TYPE, DEFAULT_DEVICE_TYPE};
pub use self::{
    device_token::{DeviceTokenManager, PushDeviceToken},
    handler::handle_notification,
    mechanism::{DeviceRegistration, PushMechanism},
    notification::{PushNotification, PushType},
    parser::PushRegistrationUri,
};
