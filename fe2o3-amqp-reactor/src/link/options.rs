//! Options used to compose the local attach of a link

use fe2o3_amqp_reactor_types::{
    definitions::{Fields, ReceiverSettleMode, Role, SenderSettleMode},
    messaging::{Source, Target},
    primitives::{Multiple, Symbol},
};
use serde::Deserialize;

/// Default amount of credit a receiver keeps issued
pub const DEFAULT_CREDIT_WINDOW: u32 = 100;

/// Options of a sender or receiver link.
///
/// Every field is optional so that a per-call option set can be merged on
/// top of the presets held by the connection or the container.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Link name. A UUID v4 is assigned when absent
    pub name: Option<String>,

    /// Source terminus
    pub source: Option<Source>,

    /// Target terminus
    pub target: Option<Target>,

    /// Sender settle mode
    pub snd_settle_mode: Option<SenderSettleMode>,

    /// Receiver settle mode
    pub rcv_settle_mode: Option<ReceiverSettleMode>,

    /// Offered capabilities, kept in the scalar-or-list shape they were given in
    pub offered_capabilities: Option<Multiple<Symbol>>,

    /// Desired capabilities, kept in the scalar-or-list shape they were given in
    pub desired_capabilities: Option<Multiple<Symbol>>,

    /// Link properties
    pub properties: Option<Fields>,

    /// Largest message the link endpoint accepts
    pub max_message_size: Option<u64>,

    /// Whether a receiver accepts each message once its handlers return
    pub autoaccept: Option<bool>,

    /// Whether a sender settles a delivery once the peer has settled it
    pub autosettle: Option<bool>,

    /// Credit a receiver keeps issued. Zero turns automatic flow off
    pub credit_window: Option<u32>,
}

impl LinkOptions {
    /// Creates a builder for [`LinkOptions`]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Returns a new option set with `overrides` applied on top of `self`.
    ///
    /// Fields set in `overrides` win. `properties` are merged key by key with
    /// the keys of `overrides` winning. `self` is left untouched.
    pub fn merge(&self, overrides: &LinkOptions) -> LinkOptions {
        let properties = match (&self.properties, &overrides.properties) {
            (Some(preset), Some(custom)) => {
                let mut merged = preset.clone();
                merged.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(merged)
            }
            (preset, custom) => custom.clone().or_else(|| preset.clone()),
        };

        LinkOptions {
            name: overrides.name.clone().or_else(|| self.name.clone()),
            source: overrides.source.clone().or_else(|| self.source.clone()),
            target: overrides.target.clone().or_else(|| self.target.clone()),
            snd_settle_mode: overrides.snd_settle_mode.or(self.snd_settle_mode),
            rcv_settle_mode: overrides.rcv_settle_mode.or(self.rcv_settle_mode),
            offered_capabilities: overrides
                .offered_capabilities
                .clone()
                .or_else(|| self.offered_capabilities.clone()),
            desired_capabilities: overrides
                .desired_capabilities
                .clone()
                .or_else(|| self.desired_capabilities.clone()),
            properties,
            max_message_size: overrides.max_message_size.or(self.max_message_size),
            autoaccept: overrides.autoaccept.or(self.autoaccept),
            autosettle: overrides.autosettle.or(self.autosettle),
            credit_window: overrides.credit_window.or(self.credit_window),
        }
    }
}

/// Builder for [`LinkOptions`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    options: LinkOptions,
}

impl Builder {
    /// Link name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Source terminus
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.options.source = Some(source.into());
        self
    }

    /// Target terminus
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.options.target = Some(target.into());
        self
    }

    /// Sender settle mode
    pub fn sender_settle_mode(mut self, mode: SenderSettleMode) -> Self {
        self.options.snd_settle_mode = Some(mode);
        self
    }

    /// Receiver settle mode
    pub fn receiver_settle_mode(mut self, mode: ReceiverSettleMode) -> Self {
        self.options.rcv_settle_mode = Some(mode);
        self
    }

    /// Offered capabilities
    pub fn offered_capabilities(mut self, capabilities: impl Into<Multiple<Symbol>>) -> Self {
        self.options.offered_capabilities = Some(capabilities.into());
        self
    }

    /// Desired capabilities
    pub fn desired_capabilities(mut self, capabilities: impl Into<Multiple<Symbol>>) -> Self {
        self.options.desired_capabilities = Some(capabilities.into());
        self
    }

    /// Replaces all link properties
    pub fn properties(mut self, properties: Fields) -> Self {
        self.options.properties = Some(properties);
        self
    }

    /// Adds one link property
    pub fn add_property(
        mut self,
        key: impl Into<Symbol>,
        value: impl Into<fe2o3_amqp_reactor_types::primitives::Value>,
    ) -> Self {
        self.options
            .properties
            .get_or_insert_with(Fields::new)
            .insert(key.into(), value.into());
        self
    }

    /// Max message size
    pub fn max_message_size(mut self, size: u64) -> Self {
        self.options.max_message_size = Some(size);
        self
    }

    /// Auto-accept incoming messages
    pub fn autoaccept(mut self, autoaccept: bool) -> Self {
        self.options.autoaccept = Some(autoaccept);
        self
    }

    /// Auto-settle outgoing deliveries once remotely settled
    pub fn autosettle(mut self, autosettle: bool) -> Self {
        self.options.autosettle = Some(autosettle);
        self
    }

    /// Credit window of a receiver
    pub fn credit_window(mut self, credit_window: u32) -> Self {
        self.options.credit_window = Some(credit_window);
        self
    }

    /// Builds the [`LinkOptions`]
    pub fn build(self) -> LinkOptions {
        self.options
    }
}

impl From<Builder> for LinkOptions {
    fn from(builder: Builder) -> Self {
        builder.build()
    }
}

/// What an application may pass to `open_sender`/`open_receiver`
#[derive(Debug, Clone, Default)]
pub enum LinkArgs {
    /// No per-call options
    #[default]
    Default,

    /// A bare address. It is the target of a sender and the source of a receiver
    Address(String),

    /// A full option set
    Options(LinkOptions),
}

impl LinkArgs {
    /// Turns the arguments into an option set for a link of the given role
    pub fn compose(self, role: Role) -> LinkOptions {
        match self {
            LinkArgs::Default => LinkOptions::default(),
            LinkArgs::Address(address) => match role {
                Role::Sender => LinkOptions {
                    target: Some(Target::from(address)),
                    ..Default::default()
                },
                Role::Receiver => LinkOptions {
                    source: Some(Source::from(address)),
                    ..Default::default()
                },
            },
            LinkArgs::Options(options) => options,
        }
    }
}

impl From<()> for LinkArgs {
    fn from(_: ()) -> Self {
        LinkArgs::Default
    }
}

impl From<&str> for LinkArgs {
    fn from(address: &str) -> Self {
        LinkArgs::Address(address.to_string())
    }
}

impl From<String> for LinkArgs {
    fn from(address: String) -> Self {
        LinkArgs::Address(address)
    }
}

impl From<LinkOptions> for LinkArgs {
    fn from(options: LinkOptions) -> Self {
        LinkArgs::Options(options)
    }
}

impl From<Builder> for LinkArgs {
    fn from(builder: Builder) -> Self {
        LinkArgs::Options(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use fe2o3_amqp_reactor_types::primitives::Value;

    use super::*;

    #[test]
    fn merge_overrides_and_keeps_preset() {
        let preset = LinkOptions::builder()
            .offered_capabilities("xyz")
            .add_property("a", 1i64)
            .add_property("b", "preset")
            .build();
        let custom = LinkOptions::builder()
            .name("custom")
            .add_property("b", "custom")
            .add_property("c", true)
            .build();

        let merged = preset.merge(&custom);
        assert_eq!(merged.name.as_deref(), Some("custom"));
        assert_eq!(merged.offered_capabilities, Some(Multiple::from("xyz")));

        let properties = merged.properties.expect("merged properties");
        assert_eq!(properties.len(), 3);
        assert_eq!(properties["a"], Value::from(1i64));
        assert_eq!(properties["b"], Value::from("custom"));
        assert_eq!(properties["c"], Value::from(true));

        let preset_properties = preset.properties.as_ref().expect("preset properties");
        assert_eq!(preset_properties.len(), 2);
        assert_eq!(preset_properties["b"], Value::from("preset"));
        assert!(preset.name.is_none());
    }

    #[test]
    fn address_composes_by_role() {
        let sender = LinkArgs::from("queue").compose(Role::Sender);
        assert_eq!(
            sender.target.and_then(|t| t.address).as_deref(),
            Some("queue")
        );
        assert!(sender.source.is_none());

        let receiver = LinkArgs::from("queue").compose(Role::Receiver);
        assert_eq!(
            receiver.source.and_then(|s| s.address).as_deref(),
            Some("queue")
        );
        assert!(receiver.target.is_none());
    }

    #[test]
    fn deserialize_from_json() {
        let options: LinkOptions = serde_json::from_str(
            r#"{
                "name": "from-config",
                "snd_settle_mode": 1,
                "offered_capabilities": ["a", "b"],
                "credit_window": 10
            }"#,
        )
        .unwrap();
        assert_eq!(options.name.as_deref(), Some("from-config"));
        assert_eq!(options.snd_settle_mode, Some(SenderSettleMode::Settled));
        assert_eq!(
            options.offered_capabilities,
            Some(Multiple::from(vec![Symbol::from("a"), Symbol::from("b")]))
        );
        assert_eq!(options.credit_window, Some(10));
    }
}
