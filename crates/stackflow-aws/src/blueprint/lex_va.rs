//! Lex V2 virtual assistant blueprint (`lex-va`)
//!
//! Deploys a bot with a Lambda code hook, audio and text conversation logs,
//! and sentiment analysis on a single alias. The bot definition is either
//! declared inline (the banking demo locale) or imported from a packaged
//! bot archive uploaded to a config bucket.

use crate::arn::lex_bot_alias_arn;
use crate::construct_id;
use crate::iam::{PolicyDocument, PolicyStatement, Role, RoleProps, ServicePrincipal};
use crate::lambda::{Architecture, Code, Function, FunctionProps, Permission, Runtime};
use crate::lex::{
    AliasLocaleSettings, Bot, BotAlias, BotAliasProps, BotDefinition, BotLocale, BotProps,
    BotVersion, ConversationLogs, FulfillmentCodeHook, Intent, IntentClosingSetting,
    OutputContext, PromptSpecification, ResolutionStrategy, Slot, SlotType, SlotTypeValue,
    ValueSelectionSetting, VoiceSettings, DRAFT_VERSION,
};
use crate::logs::{LogGroup, LogGroupProps, RetentionDays};
use crate::s3::{BlockPublicAccess, Bucket, BucketDeployment, BucketDeploymentProps, BucketProps};
use serde::Deserialize;
use stackflow_core::{
    Blueprint, BlueprintDefinition, BuildContext, RemovalPolicy, Result, StackBuilder,
    StackError, Value,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const LOG_PREFIX: &str = "helloLexBot";

/// How the bot definition reaches the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotSource {
    /// Locales, intents and slot types declared in the template
    Inline,
    /// Exported bot archive deployed to a config bucket
    Imported {
        source_dir: PathBuf,
        object_key: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
enum BotSourceKind {
    #[default]
    Inline,
    Imported,
}

/// Blueprint parameters, written in kebab-case in KDL
/// (`blueprint "lex-va" bot-name="..." log-retention-days=7`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LexVaProps {
    pub bot_name: String,
    pub alias_name: String,
    pub locale: String,
    /// Defaults to `resources/lexBot` for an inline bot and
    /// `resources/lexCodeHook` for an imported one, where `resources/lexBot`
    /// holds the bot archive instead.
    pub code_hook_path: Option<PathBuf>,
    pub idle_session_ttl: u32,
    pub log_retention_days: u32,
    bot_source: BotSourceKind,
    pub bot_definition_dir: PathBuf,
    pub bot_definition_key: String,
    pub deployment_handler: PathBuf,
}

impl Default for LexVaProps {
    fn default() -> Self {
        Self {
            bot_name: "HelloWorldDemo".to_string(),
            alias_name: "HelloBotDemo".to_string(),
            locale: "en_US".to_string(),
            code_hook_path: None,
            idle_session_ttl: 300,
            log_retention_days: 7,
            bot_source: BotSourceKind::Inline,
            bot_definition_dir: PathBuf::from("resources/lexBot"),
            bot_definition_key: "HelloWorldDemo-1-FS8UYM6HDJ-LexJson.zip".to_string(),
            deployment_handler: PathBuf::from("resources/bucketDeployment"),
        }
    }
}

impl LexVaProps {
    pub fn from_definition(definition: &BlueprintDefinition) -> Result<Self> {
        let params = serde_json::Value::Object(
            definition
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        serde_json::from_value(params).map_err(|e| {
            StackError::InvalidConfig(format!("{}: {}", definition.kind, e))
        })
    }

    /// Directory of the code hook function
    pub fn code_hook_path(&self) -> PathBuf {
        match (&self.code_hook_path, self.bot_source) {
            (Some(path), _) => path.clone(),
            (None, BotSourceKind::Inline) => PathBuf::from("resources/lexBot"),
            (None, BotSourceKind::Imported) => PathBuf::from("resources/lexCodeHook"),
        }
    }

    pub fn bot_source(&self) -> BotSource {
        match self.bot_source {
            BotSourceKind::Inline => BotSource::Inline,
            BotSourceKind::Imported => BotSource::Imported {
                source_dir: self.bot_definition_dir.clone(),
                object_key: self.bot_definition_key.clone(),
            },
        }
    }

    pub fn with_bot_source(mut self, source: BotSource) -> Self {
        match source {
            BotSource::Inline => self.bot_source = BotSourceKind::Inline,
            BotSource::Imported {
                source_dir,
                object_key,
            } => {
                self.bot_source = BotSourceKind::Imported;
                self.bot_definition_dir = source_dir;
                self.bot_definition_key = object_key;
            }
        }
        self
    }
}

/// `lex-va` blueprint
#[derive(Debug, Clone, Copy, Default)]
pub struct LexVaBlueprint;

impl LexVaBlueprint {
    pub const NAME: &'static str = "lex-va";

    /// Adds every resource of the assistant to `builder`.
    #[tracing::instrument(skip_all, fields(stack = %builder.name(), bot = %props.bot_name))]
    pub fn build(
        &self,
        builder: &mut StackBuilder,
        props: &LexVaProps,
        context: &BuildContext,
    ) -> Result<()> {
        let mut hook = FunctionProps::new(
            Runtime::Python39,
            Code::from_asset(context.resolve_path(props.code_hook_path())),
            "index.lambda_handler",
        );
        hook.architecture = Architecture::Arm64;
        hook.timeout = Some(Duration::from_secs(60));
        let code_hook = Function::new(builder, "lexCodeHook", hook)?;

        let log_group = LogGroup::new(
            builder,
            "lexLogGroup",
            LogGroupProps {
                retention: RetentionDays::at_least(props.log_retention_days),
                ..Default::default()
            },
        )?;

        let audio_bucket = Bucket::new(
            builder,
            "lexAudioBucket",
            BucketProps {
                block_public_access: Some(BlockPublicAccess::BlockAll),
                removal_policy: Some(RemovalPolicy::Destroy),
                auto_delete_objects: true,
                ..Default::default()
            },
        )?;

        let lex_policy = PolicyDocument::new(vec![
            PolicyStatement::allow(
                ["polly:SynthesizeSpeech", "comprehend:DetectSentiment"],
                [Value::string("*")],
            ),
            PolicyStatement::allow(
                ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                [log_group.arn()],
            ),
        ]);
        let lex_role = Role::new(
            builder,
            "lexRole",
            RoleProps::new(ServicePrincipal::new("lex.amazonaws.com"))
                .inline_policy("lexPolicy", lex_policy),
        )?;
        audio_bucket.grant_read_write(builder, &lex_role)?;

        let (definition, deployment) = match props.bot_source() {
            BotSource::Inline => (
                BotDefinition::Locales(vec![banking_locale(&props.locale)]),
                None,
            ),
            BotSource::Imported {
                source_dir,
                object_key,
            } => {
                let config_bucket = Bucket::new(
                    builder,
                    &construct_id(&[&props.bot_name, "ConfigBucket"]),
                    BucketProps {
                        block_public_access: Some(BlockPublicAccess::BlockAll),
                        removal_policy: Some(RemovalPolicy::Destroy),
                        auto_delete_objects: true,
                        ..Default::default()
                    },
                )?;
                let deployment = BucketDeployment::new(
                    builder,
                    &construct_id(&[&props.bot_name, "BotConfig"]),
                    &config_bucket,
                    BucketDeploymentProps::new(
                        vec![context.resolve_path(&source_dir)],
                        Code::from_asset(context.resolve_path(&props.deployment_handler)),
                    ),
                )?;
                (
                    BotDefinition::S3Location {
                        bucket: deployment.deployed_bucket_name(),
                        object_key,
                    },
                    Some(deployment),
                )
            }
        };

        let bot = Bot::new(
            builder,
            "helloLexBot",
            BotProps {
                name: props.bot_name.clone(),
                role_arn: lex_role.arn(),
                idle_session_ttl_in_seconds: props.idle_session_ttl,
                child_directed: false,
                auto_build_bot_locales: true,
                description: None,
                definition,
            },
        )?;
        if let Some(deployment) = &deployment {
            builder.add_dependency(bot.handle(), deployment.handle())?;
        }

        let version = BotVersion::new(
            builder,
            "helloLexBotVersion",
            &bot,
            &[props.locale.clone()],
            DRAFT_VERSION,
        )?;

        let alias = BotAlias::new(
            builder,
            "helloLexBotAlias",
            &bot,
            BotAliasProps {
                name: props.alias_name.clone(),
                bot_version: Some(version.version()),
                locale_settings: vec![AliasLocaleSettings {
                    locale_id: props.locale.clone(),
                    enabled: true,
                    code_hook_arn: Some(code_hook.arn()),
                }],
                conversation_logs: Some(ConversationLogs {
                    audio: Some((audio_bucket.arn(), LOG_PREFIX.to_string())),
                    text: Some((log_group.arn(), LOG_PREFIX.to_string())),
                }),
                detect_sentiment: true,
                description: None,
            },
        )?;

        let alias_arn = lex_bot_alias_arn(builder, &bot, &alias);
        code_hook.add_permission(
            builder,
            "Lex Invocation",
            Permission::new(ServicePrincipal::new("lexv2.amazonaws.com")).source_arn(alias_arn),
        )?;

        info!(resources = builder.len(), "Expanded lex-va blueprint");
        Ok(())
    }
}

impl Blueprint for LexVaBlueprint {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Lex V2 bot with a Lambda code hook, conversation logs and sentiment analysis"
    }

    fn expand(
        &self,
        builder: &mut StackBuilder,
        definition: &BlueprintDefinition,
        context: &BuildContext,
    ) -> Result<()> {
        let props = LexVaProps::from_definition(definition)?;
        self.build(builder, &props, context)
    }
}

/// Banking demo: balance lookup by account type plus a fallback intent.
fn banking_locale(locale_id: &str) -> BotLocale {
    let account_type = SlotType {
        name: "accountType".to_string(),
        description: Some("Slot Type description".to_string()),
        value_selection_setting: ValueSelectionSetting {
            resolution_strategy: ResolutionStrategy::TopResolution,
        },
        slot_type_values: vec![
            SlotTypeValue::new("Checking"),
            SlotTypeValue::new("Savings"),
            SlotTypeValue::new("Credit").synonyms([
                "credit card",
                "visa",
                "mastercard",
                "amex",
                "american express",
            ]),
        ],
    };

    let mut closing = IntentClosingSetting::plain_text(
        "Thanks for checking your balance.  Have a nice day.",
    );
    closing.closing_response.allow_interrupt = Some(false);
    closing.is_active = Some(true);

    let check_balance = Intent {
        description: Some(
            "Intent to check the balance in the specified account type".to_string(),
        ),
        fulfillment_code_hook: Some(FulfillmentCodeHook { enabled: true }),
        output_contexts: vec![OutputContext {
            name: "contextCheckBalance".to_string(),
            time_to_live_in_seconds: 90,
            turns_to_live: 5,
        }],
        intent_closing_setting: Some(closing),
        ..Intent::new("CheckBalance")
    }
    .utterances([
        "What’s the balance in my account ?",
        "Check my account balance",
        "What’s the balance in my {accountType} account ?",
        "How much do I have in {accountType} ?",
        "I want to check the balance",
        "Can you help me with account balance ?",
        "Balance in {accountType}",
    ])
    .slot(Slot::required(
        "accountType",
        "accountType",
        PromptSpecification::plain_text("For which account would you like your balance?", 2),
    ))
    .slot(Slot::required(
        "dateOfBirth",
        "AMAZON.Date",
        PromptSpecification::plain_text(
            "For verification purposes, what is your date of birth?",
            2,
        ),
    ));

    let fallback = Intent {
        parent_intent_signature: Some("AMAZON.FallbackIntent".to_string()),
        intent_closing_setting: Some(IntentClosingSetting::plain_text(
            "Sorry I am having trouble understanding. Can you describe what you'd like to do in a few words? I can help you find your account balance, transfer funds and open an account.",
        )),
        ..Intent::new("FallbackIntent")
    };

    BotLocale {
        locale_id: locale_id.to_string(),
        nlu_confidence_threshold: 0.4,
        description: Some("English_US".to_string()),
        voice_settings: Some(VoiceSettings::neural("Joanna")),
        slot_types: vec![account_type],
        intents: vec![check_balance, fallback],
    }
}
