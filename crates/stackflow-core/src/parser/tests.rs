use super::*;
use crate::model::{Environment, StackItem, Value};

#[test]
fn test_parse_minimal_stack() {
    let kdl = r#"
        app "demo-lex-va"

        stack "DemoLexVaCicdStack" {
            resource "lexLogGroup" type="AWS::Logs::LogGroup" {
                RetentionInDays 7
            }
        }
    "#;

    let project = parse_kdl_string(kdl, "test".to_string()).unwrap();
    assert_eq!(project.app, "demo-lex-va");
    assert_eq!(project.stacks.len(), 1);

    let stack = project.stack("DemoLexVaCicdStack").unwrap();
    let draft = stack.resources().next().unwrap();
    assert_eq!(draft.kind, "AWS::Logs::LogGroup");
    assert_eq!(draft.properties["RetentionInDays"], Value::int(7));
}

#[test]
fn test_default_app_name() {
    let project = parse_kdl_string("", "fallback".to_string()).unwrap();
    assert_eq!(project.app, "fallback");
    assert!(project.stacks.is_empty());
}

#[test]
fn test_parse_project_env_and_variables() {
    let kdl = r#"
        env account="123456789012" region="us-east-1"

        variables {
            BOT_NAME "HelloWorldDemo"
            LOCALE "en_US"
        }
    "#;

    let project = parse_kdl_string(kdl, "test".to_string()).unwrap();
    assert_eq!(
        project.environment,
        Environment::new("123456789012", "us-east-1")
    );
    assert_eq!(project.variables["BOT_NAME"], "HelloWorldDemo");
    assert_eq!(project.variables["LOCALE"], "en_US");
}

#[test]
fn test_resources_keep_declaration_order() {
    let kdl = r#"
        stack "Ordered" {
            resource "Zeta" type="AWS::Logs::LogGroup"
            blueprint "lex-va"
            resource "Alpha" type="AWS::S3::Bucket"
        }
    "#;

    let project = parse_kdl_string(kdl, "test".to_string()).unwrap();
    let stack = &project.stacks[0];
    let ids: Vec<&str> = stack.resources().map(|r| r.logical_id.as_str()).collect();
    assert_eq!(ids, vec!["Zeta", "Alpha"]);
    assert!(matches!(stack.items[1], StackItem::Blueprint(_)));
}

#[test]
fn test_same_stack_is_merged() {
    let kdl = r#"
        stack "Demo" {
            description "base"
            env region="us-east-1"
            resource "A" type="AWS::S3::Bucket"
        }

        stack "Demo" {
            env account="111111111111"
            resource "B" type="AWS::S3::Bucket"
        }
    "#;

    let project = parse_kdl_string(kdl, "test".to_string()).unwrap();
    assert_eq!(project.stacks.len(), 1);

    let stack = &project.stacks[0];
    assert_eq!(stack.description.as_deref(), Some("base"));
    assert_eq!(stack.environment, Environment::new("111111111111", "us-east-1"));
    assert_eq!(stack.resources().count(), 2);
}

#[test]
fn test_unknown_top_level_node_is_ignored() {
    let kdl = r#"
        telemetry enabled=#false
        stack "Demo"
    "#;

    let project = parse_kdl_string(kdl, "test".to_string()).unwrap();
    assert_eq!(project.stacks.len(), 1);
}

#[test]
fn test_stack_without_name_is_error() {
    let result = parse_kdl_string("stack", "test".to_string());
    assert!(result.is_err());
}

#[test]
fn test_invalid_kdl_is_error() {
    let result = parse_kdl_string("stack \"Broken\" {", "test".to_string());
    assert!(result.is_err());
}

#[test]
fn test_parse_deferred_references() {
    let kdl = r#"
        stack "Demo" {
            resource "lexRole" type="AWS::IAM::Role" {
                AssumeRolePolicyDocument {
                    Version "2012-10-17"
                }
            }
            resource "helloLexBot" type="AWS::Lex::Bot" {
                Name "HelloWorldDemo"
                IdleSessionTTLInSeconds 300
                DataPrivacy ChildDirected=#false
                RoleArn { get-att "lexRole" "Arn"; }
            }
        }
    "#;

    let project = parse_kdl_string(kdl, "test".to_string()).unwrap();
    let bot = project.stacks[0]
        .resources()
        .find(|r| r.logical_id.as_str() == "helloLexBot")
        .unwrap();

    let refs = bot.properties["RoleArn"].references();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].target.as_str(), "lexRole");

    let Value::Map(privacy) = &bot.properties["DataPrivacy"] else {
        panic!("expected map");
    };
    assert_eq!(privacy["ChildDirected"], Value::bool(false));
}

#[test]
fn test_parse_kdl_file_uses_parent_dir_name() {
    let dir = tempfile::tempdir().unwrap();
    let project_dir = dir.path().join("lex-demo");
    std::fs::create_dir_all(&project_dir).unwrap();
    let path = project_dir.join("stack.kdl");
    std::fs::write(&path, "stack \"Demo\"").unwrap();

    let project = parse_kdl_file(&path).unwrap();
    assert_eq!(project.app, "lex-demo");
}
