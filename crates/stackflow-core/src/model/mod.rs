//! モデル定義
//!
//! リソース記述子・遅延参照・スタックのデータモデルを定義します。

mod descriptor;
mod project;
mod stack;
mod value;

// Re-exports
pub use descriptor::*;
pub use project::*;
pub use stack::*;
pub use value::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_references_nested() {
        let value = Value::map([
            (
                "Roles",
                Value::List(vec![Value::Deferred(Reference {
                    target: LogicalId::new("RoleA"),
                    attribute: Attribute::Ref,
                })]),
            ),
            (
                "Arn",
                Value::join(
                    "",
                    vec![
                        Value::string("arn:"),
                        Value::Pseudo(PseudoParameter::Partition),
                        Value::Deferred(Reference {
                            target: LogicalId::new("BucketB"),
                            attribute: Attribute::GetAtt("Arn".to_string()),
                        }),
                    ],
                ),
            ),
        ]);

        // Map はキー順に走査される
        let targets: Vec<_> = value
            .references()
            .into_iter()
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(targets, vec!["BucketB", "RoleA"]);
        assert!(!value.is_resolved());
    }

    #[test]
    fn test_literal_is_resolved() {
        let value = Value::from(vec!["a", "b"]);
        assert!(value.is_resolved());
        assert!(value.references().is_empty());
    }

    #[test]
    fn test_from_serialize() {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct DataPrivacy {
            child_directed: bool,
        }

        let value = Value::from_serialize(&DataPrivacy {
            child_directed: false,
        })
        .unwrap();
        assert_eq!(
            value,
            Value::Literal(serde_json::json!({ "ChildDirected": false }))
        );
    }

    #[test]
    fn test_environment_or() {
        let env = Environment {
            account: None,
            region: Some("us-east-1".to_string()),
        }
        .or(&Environment::new("123456789012", "eu-west-1"));
        assert_eq!(env.account.as_deref(), Some("123456789012"));
        assert_eq!(env.region.as_deref(), Some("us-east-1"));
        assert!(!env.is_agnostic());
        assert!(Environment::agnostic().is_agnostic());
    }

    #[test]
    fn test_pseudo_parameter_names() {
        for p in [
            PseudoParameter::AccountId,
            PseudoParameter::Region,
            PseudoParameter::Partition,
            PseudoParameter::StackName,
            PseudoParameter::UrlSuffix,
        ] {
            assert_eq!(PseudoParameter::from_cfn_name(p.cfn_name()), Some(p));
        }
    }
}
