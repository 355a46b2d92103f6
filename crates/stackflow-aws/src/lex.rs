//! Amazon Lex V2 bots, versions and aliases
//!
//! Static bot definitions (locales, intents, slot types) are plain serde
//! structs serialized in the CloudFormation property shape. Alias settings
//! carry deferred references and are assembled as [`Value`] trees instead.

use serde::Serialize;
use stackflow_core::{
    LogicalId, ResourceDraft, ResourceHandle, Result, StackBuilder, StackError, Value,
};

/// Version that always tracks the working copy of a bot
pub const DRAFT_VERSION: &str = "DRAFT";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceSettings {
    pub voice_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl VoiceSettings {
    pub fn neural(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            engine: Some("neural".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PlainTextMessage {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    pub plain_text_message: PlainTextMessage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MessageGroup {
    pub message: Message,
}

impl MessageGroup {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self {
            message: Message {
                plain_text_message: PlainTextMessage { value: text.into() },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseSpecification {
    pub message_groups_list: Vec<MessageGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_interrupt: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PromptSpecification {
    pub message_groups_list: Vec<MessageGroup>,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_interrupt: Option<bool>,
}

impl PromptSpecification {
    pub fn plain_text(text: impl Into<String>, max_retries: u32) -> Self {
        Self {
            message_groups_list: vec![MessageGroup::plain_text(text)],
            max_retries,
            allow_interrupt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SlotConstraint {
    Required,
    Optional,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ValueElicitationSetting {
    pub slot_constraint: SlotConstraint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_specification: Option<PromptSpecification>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Slot {
    pub name: String,
    pub slot_type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value_elicitation_setting: ValueElicitationSetting,
}

impl Slot {
    pub fn required(
        name: impl Into<String>,
        slot_type_name: impl Into<String>,
        prompt: PromptSpecification,
    ) -> Self {
        Self {
            name: name.into(),
            slot_type_name: slot_type_name.into(),
            description: None,
            value_elicitation_setting: ValueElicitationSetting {
                slot_constraint: SlotConstraint::Required,
                prompt_specification: Some(prompt),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SlotPriority {
    pub priority: u32,
    pub slot_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SampleUtterance {
    pub utterance: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct OutputContext {
    pub name: String,
    pub time_to_live_in_seconds: u32,
    pub turns_to_live: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct FulfillmentCodeHook {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct IntentClosingSetting {
    pub closing_response: ResponseSpecification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl IntentClosingSetting {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self {
            closing_response: ResponseSpecification {
                message_groups_list: vec![MessageGroup::plain_text(text)],
                allow_interrupt: None,
            },
            is_active: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Intent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Built-in parent such as `AMAZON.FallbackIntent`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_intent_signature: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_utterances: Vec<SampleUtterance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_code_hook: Option<FulfillmentCodeHook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_contexts: Vec<OutputContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_closing_setting: Option<IntentClosingSetting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<Slot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slot_priorities: Vec<SlotPriority>,
}

impl Intent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn utterances<S: Into<String>>(mut self, utterances: impl IntoIterator<Item = S>) -> Self {
        self.sample_utterances.extend(
            utterances
                .into_iter()
                .map(|u| SampleUtterance { utterance: u.into() }),
        );
        self
    }

    /// Appends a slot and gives it the next priority
    pub fn slot(mut self, slot: Slot) -> Self {
        self.slot_priorities.push(SlotPriority {
            priority: self.slot_priorities.len() as u32 + 1,
            slot_name: slot.name.clone(),
        });
        self.slots.push(slot);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    OriginalValue,
    #[default]
    TopResolution,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ValueSelectionSetting {
    pub resolution_strategy: ResolutionStrategy,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SampleValue {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SlotTypeValue {
    pub sample_value: SampleValue,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<SampleValue>,
}

impl SlotTypeValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            sample_value: SampleValue { value: value.into() },
            synonyms: Vec::new(),
        }
    }

    pub fn synonyms<S: Into<String>>(mut self, synonyms: impl IntoIterator<Item = S>) -> Self {
        self.synonyms
            .extend(synonyms.into_iter().map(|s| SampleValue { value: s.into() }));
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SlotType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value_selection_setting: ValueSelectionSetting,
    pub slot_type_values: Vec<SlotTypeValue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BotLocale {
    pub locale_id: String,
    pub nlu_confidence_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slot_types: Vec<SlotType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<Intent>,
}

/// Where the bot's locales come from
#[derive(Debug, Clone)]
pub enum BotDefinition {
    /// Locales declared in the template
    Locales(Vec<BotLocale>),
    /// Exported bot archive in S3 (`BotFileS3Location`)
    S3Location { bucket: Value, object_key: String },
}

/// Properties for [`Bot::new`]
#[derive(Debug, Clone)]
pub struct BotProps {
    pub name: String,
    pub role_arn: Value,
    pub idle_session_ttl_in_seconds: u32,
    pub child_directed: bool,
    pub auto_build_bot_locales: bool,
    pub description: Option<String>,
    pub definition: BotDefinition,
}

fn to_value<T: Serialize>(id: &str, value: &T) -> Result<Value> {
    Value::from_serialize(value).map_err(|e| StackError::validation(id, e.to_string()))
}

/// `AWS::Lex::Bot`
#[derive(Debug, Clone)]
pub struct Bot {
    handle: ResourceHandle,
    locale_ids: Vec<String>,
}

impl Bot {
    pub fn new(builder: &mut StackBuilder, id: &str, props: BotProps) -> Result<Self> {
        let mut draft = ResourceDraft::new(id, "AWS::Lex::Bot")
            .property(
                "DataPrivacy",
                Value::map([("ChildDirected", Value::bool(props.child_directed))]),
            )
            .property(
                "IdleSessionTTLInSeconds",
                props.idle_session_ttl_in_seconds,
            )
            .property("Name", props.name)
            .property("RoleArn", props.role_arn)
            .property("AutoBuildBotLocales", props.auto_build_bot_locales)
            .property_opt("Description", props.description);

        let locale_ids = match &props.definition {
            BotDefinition::Locales(locales) => {
                draft = draft.property("BotLocales", to_value(id, locales)?);
                locales.iter().map(|l| l.locale_id.clone()).collect()
            }
            BotDefinition::S3Location { bucket, object_key } => {
                draft = draft.property(
                    "BotFileS3Location",
                    Value::map([
                        ("S3Bucket", bucket.clone()),
                        ("S3ObjectKey", Value::string(object_key.clone())),
                    ]),
                );
                Vec::new()
            }
        };

        Ok(Self {
            handle: builder.add(draft)?,
            locale_ids,
        })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    /// Bot id (`Ref`)
    pub fn bot_id(&self) -> Value {
        self.handle.reference()
    }

    pub fn arn(&self) -> Value {
        self.handle.attribute("Arn")
    }

    /// Locales declared inline. Empty for imported bots.
    pub fn locale_ids(&self) -> &[String] {
        &self.locale_ids
    }
}

/// `AWS::Lex::BotVersion`
#[derive(Debug, Clone)]
pub struct BotVersion {
    handle: ResourceHandle,
}

impl BotVersion {
    /// Snapshot `source_version` of every given locale
    pub fn new(
        builder: &mut StackBuilder,
        id: &str,
        bot: &Bot,
        locale_ids: &[String],
        source_version: &str,
    ) -> Result<Self> {
        if locale_ids.is_empty() {
            return Err(StackError::validation(
                id,
                "bot version needs at least one locale",
            ));
        }
        let specification = locale_ids
            .iter()
            .map(|locale| {
                Value::map([
                    ("LocaleId", Value::string(locale.clone())),
                    (
                        "BotVersionLocaleDetails",
                        Value::map([("SourceBotVersion", Value::string(source_version))]),
                    ),
                ])
            })
            .collect::<Vec<_>>();

        let draft = ResourceDraft::new(id, "AWS::Lex::BotVersion")
            .property("BotId", bot.bot_id())
            .property("BotVersionLocaleSpecification", Value::List(specification));

        Ok(Self {
            handle: builder.add(draft)?,
        })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    /// Version number assigned at deploy time
    pub fn version(&self) -> Value {
        self.handle.attribute("BotVersion")
    }
}

/// Per-locale alias settings
#[derive(Debug, Clone)]
pub struct AliasLocaleSettings {
    pub locale_id: String,
    pub enabled: bool,
    /// Lambda invoked for dialog and fulfillment code hooks
    pub code_hook_arn: Option<Value>,
}

impl AliasLocaleSettings {
    fn to_value(&self) -> Value {
        let mut settings = vec![("Enabled", Value::bool(self.enabled))];
        if let Some(arn) = &self.code_hook_arn {
            settings.push((
                "CodeHookSpecification",
                Value::map([(
                    "LambdaCodeHook",
                    Value::map([
                        ("CodeHookInterfaceVersion", Value::string("1.0")),
                        ("LambdaArn", arn.clone()),
                    ]),
                )]),
            ));
        }
        Value::map([
            ("LocaleId", Value::string(self.locale_id.clone())),
            ("BotAliasLocaleSetting", Value::map(settings)),
        ])
    }
}

/// Conversation log destinations
#[derive(Debug, Clone, Default)]
pub struct ConversationLogs {
    /// `(bucket arn, log prefix)`
    pub audio: Option<(Value, String)>,
    /// `(log group arn, log prefix)`
    pub text: Option<(Value, String)>,
}

impl ConversationLogs {
    fn to_value(&self) -> Value {
        let mut settings = Vec::new();
        if let Some((bucket_arn, prefix)) = &self.audio {
            settings.push((
                "AudioLogSettings",
                Value::List(vec![Value::map([
                    (
                        "Destination",
                        Value::map([(
                            "S3Bucket",
                            Value::map([
                                ("LogPrefix", Value::string(prefix.clone())),
                                ("S3BucketArn", bucket_arn.clone()),
                            ]),
                        )]),
                    ),
                    ("Enabled", Value::bool(true)),
                ])]),
            ));
        }
        if let Some((log_group_arn, prefix)) = &self.text {
            settings.push((
                "TextLogSettings",
                Value::List(vec![Value::map([
                    (
                        "Destination",
                        Value::map([(
                            "CloudWatch",
                            Value::map([
                                ("CloudWatchLogGroupArn", log_group_arn.clone()),
                                ("LogPrefix", Value::string(prefix.clone())),
                            ]),
                        )]),
                    ),
                    ("Enabled", Value::bool(true)),
                ])]),
            ));
        }
        Value::map(settings)
    }
}

/// Properties for [`BotAlias::new`]
#[derive(Debug, Clone, Default)]
pub struct BotAliasProps {
    pub name: String,
    pub bot_version: Option<Value>,
    pub locale_settings: Vec<AliasLocaleSettings>,
    pub conversation_logs: Option<ConversationLogs>,
    pub detect_sentiment: bool,
    pub description: Option<String>,
}

/// `AWS::Lex::BotAlias`
#[derive(Debug, Clone)]
pub struct BotAlias {
    handle: ResourceHandle,
}

impl BotAlias {
    pub fn new(
        builder: &mut StackBuilder,
        id: &str,
        bot: &Bot,
        props: BotAliasProps,
    ) -> Result<Self> {
        let locale_settings = (!props.locale_settings.is_empty()).then(|| {
            Value::List(
                props
                    .locale_settings
                    .iter()
                    .map(AliasLocaleSettings::to_value)
                    .collect(),
            )
        });

        let draft = ResourceDraft::new(id, "AWS::Lex::BotAlias")
            .property("BotAliasName", props.name)
            .property("BotId", bot.bot_id())
            .property_opt("BotVersion", props.bot_version)
            .property_opt("BotAliasLocaleSettings", locale_settings)
            .property_opt(
                "ConversationLogSettings",
                props.conversation_logs.as_ref().map(ConversationLogs::to_value),
            )
            .property_opt(
                "SentimentAnalysisSettings",
                props
                    .detect_sentiment
                    .then(|| Value::map([("DetectSentiment", Value::bool(true))])),
            )
            .property_opt("Description", props.description);

        Ok(Self {
            handle: builder.add(draft)?,
        })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    pub fn alias_id(&self) -> Value {
        self.handle.attribute("BotAliasId")
    }

    pub fn arn(&self) -> Value {
        self.handle.attribute("Arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::Environment;

    fn locale() -> BotLocale {
        BotLocale {
            locale_id: "en_US".to_string(),
            nlu_confidence_threshold: 0.4,
            description: None,
            voice_settings: Some(VoiceSettings::neural("Joanna")),
            slot_types: Vec::new(),
            intents: vec![
                Intent::new("CheckBalance")
                    .utterances(["Check my account balance"])
                    .slot(Slot::required(
                        "dateOfBirth",
                        "AMAZON.Date",
                        PromptSpecification::plain_text("What is your date of birth?", 2),
                    )),
            ],
        }
    }

    fn bot(builder: &mut StackBuilder) -> Bot {
        Bot::new(
            builder,
            "helloLexBot",
            BotProps {
                name: "HelloWorldDemo".to_string(),
                role_arn: Value::string("arn:aws:iam::123456789012:role/lex"),
                idle_session_ttl_in_seconds: 300,
                child_directed: false,
                auto_build_bot_locales: true,
                description: None,
                definition: BotDefinition::Locales(vec![locale()]),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_locale_serializes_in_cloudformation_shape() {
        let json = serde_json::to_value(locale()).unwrap();
        assert_eq!(json["LocaleId"], "en_US");
        assert_eq!(json["VoiceSettings"]["Engine"], "neural");
        assert!(json.get("SlotTypes").is_none());

        let intent = &json["Intents"][0];
        assert_eq!(intent["SampleUtterances"][0]["Utterance"], "Check my account balance");
        assert_eq!(intent["SlotPriorities"][0]["Priority"], 1);
        assert_eq!(
            intent["Slots"][0]["ValueElicitationSetting"]["SlotConstraint"],
            "Required"
        );
    }

    #[test]
    fn test_resolution_strategy_name() {
        let setting = ValueSelectionSetting {
            resolution_strategy: ResolutionStrategy::TopResolution,
        };
        let json = serde_json::to_value(setting).unwrap();
        assert_eq!(json["ResolutionStrategy"], "TOP_RESOLUTION");
    }

    #[test]
    fn test_version_and_alias_edges() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let bot = bot(&mut builder);
        let version = BotVersion::new(
            &mut builder,
            "helloLexBotVersion",
            &bot,
            bot.locale_ids(),
            DRAFT_VERSION,
        )
        .unwrap();
        BotAlias::new(
            &mut builder,
            "helloLexBotAlias",
            &bot,
            BotAliasProps {
                name: "HelloBotDemo".to_string(),
                bot_version: Some(version.version()),
                locale_settings: vec![AliasLocaleSettings {
                    locale_id: "en_US".to_string(),
                    enabled: true,
                    code_hook_arn: None,
                }],
                detect_sentiment: true,
                ..Default::default()
            },
        )
        .unwrap();

        let stack = builder.assemble().unwrap();
        assert_eq!(stack.edges().len(), 3);
        assert_eq!(stack.waves().len(), 3);
        assert!(stack.warnings().is_empty());
    }

    #[test]
    fn test_version_requires_locale() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let bot = bot(&mut builder);
        let err = BotVersion::new(&mut builder, "Version", &bot, &[], DRAFT_VERSION).unwrap_err();
        assert!(matches!(err, StackError::Validation { .. }));
    }
}
