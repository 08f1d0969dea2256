//! Built-in demo bot

use shift_config::{
    AuthDescriptor, AuthMode, AutomationFlow, Channel, ChannelDetail, Component, ComponentDetail,
    ConfigError, Entity, EntityDetail, EntityKind, FlowDetail, FlowTrigger, Skill, SkillDetail,
    SourceConfiguration, Topic, TopicDetail, TopicKind,
};

fn topic(id: &str, name: &str, migratable: bool, kind: TopicKind, phrases: &[&str]) -> Result<Topic, ConfigError> {
    Topic::new(
        id,
        name,
        migratable,
        TopicDetail {
            kind,
            trigger_phrases: phrases.iter().map(|p| (*p).to_string()).collect(),
        },
    )
}

fn entity(id: &str, name: &str, kind: EntityKind, values: &[&str]) -> Result<Entity, ConfigError> {
    Entity::new(
        id,
        name,
        true,
        EntityDetail {
            kind,
            values: values.iter().map(|v| (*v).to_string()).collect(),
        },
    )
}

/// Retail support bot with a mix of migratable and legacy content
pub(crate) fn retail_bot() -> Result<SourceConfiguration, ConfigError> {
    Ok(SourceConfiguration::new("bot-retail-support", "Retail Support")?
        .with_description("Order tracking, returns and store hours")
        .with_auth(
            AuthDescriptor::new(AuthMode::Integrated).with_scopes(["profile", "orders.read"]),
        )
        .with_topic(topic(
            "track-order",
            "Track order",
            true,
            TopicKind::Custom,
            &["where is my order", "track package"],
        )?)
        .with_topic(topic(
            "return-item",
            "Return an item",
            true,
            TopicKind::Custom,
            &["return", "refund"],
        )?)
        .with_topic(topic("greeting", "Greeting", true, TopicKind::System, &["hi", "hello"])?)
        .with_topic(topic("fallback", "Fallback", true, TopicKind::Fallback, &[])?)
        .with_topic(topic(
            "store-locator-v1",
            "Store locator (legacy)",
            false,
            TopicKind::Custom,
            &["nearest store"],
        )?)
        .with_entity(entity("order-number", "Order number", EntityKind::Regex, &[r"[A-Z]{2}\d{8}"])?)
        .with_entity(entity(
            "product-category",
            "Product category",
            EntityKind::ClosedList,
            &["shoes", "outerwear", "accessories"],
        )?)
        .with_entity(entity("date", "Date", EntityKind::Prebuilt, &[])?)
        .with_flow(AutomationFlow::new(
            "lookup-order",
            "Look up order",
            true,
            FlowDetail {
                trigger: FlowTrigger::Topic,
                connector: Some("orders-api".to_string()),
            },
        )?)
        .with_flow(AutomationFlow::new(
            "sync-inventory",
            "Sync inventory",
            true,
            FlowDetail {
                trigger: FlowTrigger::Schedule,
                connector: Some("inventory-db".to_string()),
            },
        )?)
        .with_channel(Channel::new(
            "web-chat",
            "Web chat",
            true,
            ChannelDetail {
                platform: "web".to_string(),
            },
        )?)
        .with_channel(Channel::new(
            "sms",
            "SMS",
            false,
            ChannelDetail {
                platform: "twilio".to_string(),
            },
        )?)
        .with_skill(Skill::new(
            "loyalty-points",
            "Loyalty points",
            false,
            SkillDetail {
                endpoint: Some("https://skills.example.com/loyalty".to_string()),
            },
        )?)
        .with_component(Component::new(
            "carousel",
            "Product carousel",
            false,
            ComponentDetail {
                component_type: "card".to_string(),
            },
        )?))
}
