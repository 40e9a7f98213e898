//! Outbound client notifications: template rendering and channel dispatch.

pub mod dispatch;
pub mod template;

pub use dispatch::{
    Channel, DeliveryId, DispatchError, GatewayError, HttpMessagingClient, MessagingGateway,
    NotificationDispatcher,
};
pub use template::{
    extract_variables, render, validate_syntax, InMemoryTemplateStore, NotificationTemplate,
    SyntaxReport, TemplateStore,
};
