//! リソース種別スキーマ
//!
//! 種別ごとの必須プロパティと参照可能な属性を定義します。
//! 登録されていない種別は動的なバックエンドとして扱い、検証を省略します。

use crate::model::Properties;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static KIND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9]+::[A-Za-z0-9]+::[A-Za-z0-9]+|Custom::[A-Za-z0-9_@-]+)$")
        .expect("kind pattern is valid")
});

/// 1つのリソース種別のスキーマ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSchema {
    pub type_name: &'static str,
    pub required: &'static [&'static str],
    pub attributes: &'static [&'static str],
}

impl KindSchema {
    /// 不足している必須プロパティ
    pub fn missing_properties(&self, properties: &Properties) -> Vec<&'static str> {
        self.required
            .iter()
            .copied()
            .filter(|key| !properties.contains_key(*key))
            .collect()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(&name)
    }
}

const BUILTIN: &[KindSchema] = &[
    KindSchema {
        type_name: "AWS::Lambda::Function",
        required: &["Code", "Handler", "Runtime"],
        attributes: &["Arn", "SnapStartResponse"],
    },
    KindSchema {
        type_name: "AWS::Lambda::Permission",
        required: &["Action", "FunctionName", "Principal"],
        attributes: &["Id"],
    },
    KindSchema {
        type_name: "AWS::S3::Bucket",
        required: &[],
        attributes: &[
            "Arn",
            "DomainName",
            "DualStackDomainName",
            "RegionalDomainName",
            "WebsiteURL",
        ],
    },
    KindSchema {
        type_name: "AWS::S3::BucketPolicy",
        required: &["Bucket", "PolicyDocument"],
        attributes: &[],
    },
    KindSchema {
        type_name: "AWS::Logs::LogGroup",
        required: &[],
        attributes: &["Arn"],
    },
    KindSchema {
        type_name: "AWS::IAM::Role",
        required: &["AssumeRolePolicyDocument"],
        attributes: &["Arn", "RoleId"],
    },
    KindSchema {
        type_name: "AWS::IAM::Policy",
        required: &["PolicyDocument", "PolicyName"],
        attributes: &["Id"],
    },
    KindSchema {
        type_name: "AWS::Lex::Bot",
        required: &["DataPrivacy", "IdleSessionTTLInSeconds", "Name", "RoleArn"],
        attributes: &["Arn", "Id"],
    },
    KindSchema {
        type_name: "AWS::Lex::BotVersion",
        required: &["BotId", "BotVersionLocaleSpecification"],
        attributes: &["BotVersion"],
    },
    KindSchema {
        type_name: "AWS::Lex::BotAlias",
        required: &["BotAliasName", "BotId"],
        attributes: &["Arn", "BotAliasId", "BotAliasStatus"],
    },
    KindSchema {
        type_name: "Custom::CDKBucketDeployment",
        required: &["ServiceToken"],
        attributes: &["DestinationBucketArn"],
    },
];

/// 種別スキーマのレジストリ
#[derive(Debug, Clone)]
pub struct KindRegistry {
    schemas: HashMap<&'static str, KindSchema>,
}

impl KindRegistry {
    /// スキーマを持たない空のレジストリ
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// 組み込みのAWSリソース種別を登録済みのレジストリ
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for schema in BUILTIN {
            registry.register(*schema);
        }
        registry
    }

    pub fn register(&mut self, schema: KindSchema) {
        self.schemas.insert(schema.type_name, schema);
    }

    pub fn get(&self, kind: &str) -> Option<&KindSchema> {
        self.schemas.get(kind)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// 種別名の書式チェック（`Vendor::Service::Type` または `Custom::Name`）
    pub fn is_well_formed(kind: &str) -> bool {
        KIND_PATTERN.is_match(kind)
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn test_builtin_function_schema() {
        let registry = KindRegistry::builtin();
        let schema = registry.get("AWS::Lambda::Function").unwrap();

        let mut props = Properties::new();
        props.insert("Runtime".to_string(), Value::string("python3.9"));
        assert_eq!(schema.missing_properties(&props), vec!["Code", "Handler"]);
        assert!(schema.has_attribute("Arn"));
        assert!(!schema.has_attribute("Url"));
    }

    #[test]
    fn test_kind_format() {
        assert!(KindRegistry::is_well_formed("AWS::Lex::BotAlias"));
        assert!(KindRegistry::is_well_formed("Custom::CDKBucketDeployment"));
        assert!(KindRegistry::is_well_formed("Custom::S3AutoDeleteObjects"));
        assert!(!KindRegistry::is_well_formed("Function"));
        assert!(!KindRegistry::is_well_formed("AWS::Lambda"));
        assert!(!KindRegistry::is_well_formed("AWS::Lambda::Function::Extra"));
    }

    #[test]
    fn test_unknown_kind_has_no_schema() {
        let registry = KindRegistry::builtin();
        assert!(registry.get("AWS::SQS::Queue").is_none());
        assert!(KindRegistry::empty().is_empty());
    }
}
