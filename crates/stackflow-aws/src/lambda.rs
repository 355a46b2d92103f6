//! Lambda functions and permissions

use crate::construct_id;
use crate::iam::{PolicyStatement, Role, RoleProps, ServicePrincipal};
use stackflow_core::{
    AssetSource, LogicalId, ResourceDraft, ResourceHandle, Result, StackBuilder, StackError, Value,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Lambda's upper bound for `Timeout`
pub const MAX_TIMEOUT_SECS: i64 = 900;

/// Function runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runtime {
    Python39,
    Python312,
    Nodejs20,
    Other(String),
}

impl Runtime {
    pub fn name(&self) -> &str {
        match self {
            Runtime::Python39 => "python3.9",
            Runtime::Python312 => "python3.12",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::Other(name) => name,
        }
    }
}

/// Instruction set architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Architecture {
    #[default]
    X86_64,
    Arm64,
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }
}

/// Function code source
#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    /// Local directory or file, zipped and staged at synthesis
    Asset(PathBuf),
    /// Inline source (`ZipFile`)
    Inline(String),
}

impl Code {
    pub fn from_asset(path: impl Into<PathBuf>) -> Self {
        Code::Asset(path.into())
    }

    pub fn from_inline(source: impl Into<String>) -> Self {
        Code::Inline(source.into())
    }

    fn to_value(&self, builder: &mut StackBuilder, function_id: &str) -> Result<Value> {
        match self {
            Code::Asset(path) => {
                let asset = builder.add_asset(AssetSource::zip(
                    construct_id(&[function_id, "Code"]),
                    path.clone(),
                ))?;
                Ok(Value::map([
                    ("S3Bucket", asset.bucket_name()),
                    ("S3Key", asset.object_key()),
                ]))
            }
            Code::Inline(source) => Ok(Value::map([("ZipFile", Value::string(source.clone()))])),
        }
    }
}

/// Properties for [`Function::new`]
#[derive(Debug, Clone)]
pub struct FunctionProps {
    pub runtime: Runtime,
    pub code: Code,
    pub handler: String,
    pub architecture: Architecture,
    pub timeout: Option<Duration>,
    pub memory_size: Option<u32>,
    pub environment: BTreeMap<String, Value>,
    pub description: Option<String>,
}

impl FunctionProps {
    pub fn new(runtime: Runtime, code: Code, handler: impl Into<String>) -> Self {
        Self {
            runtime,
            code,
            handler: handler.into(),
            architecture: Architecture::default(),
            timeout: None,
            memory_size: None,
            environment: BTreeMap::new(),
            description: None,
        }
    }
}

/// `AWS::Lambda::Function` with its execution role
#[derive(Debug, Clone)]
pub struct Function {
    handle: ResourceHandle,
    role: Role,
}

impl Function {
    /// Creates `<id>ServiceRole` (basic execution policy) and the function.
    pub fn new(builder: &mut StackBuilder, id: &str, props: FunctionProps) -> Result<Self> {
        let timeout = props
            .timeout
            .map(|t| {
                i64::try_from(t.as_secs())
                    .ok()
                    .filter(|secs| *secs <= MAX_TIMEOUT_SECS)
                    .ok_or_else(|| {
                        StackError::validation(
                            id,
                            format!("timeout must be at most {} seconds", MAX_TIMEOUT_SECS),
                        )
                    })
            })
            .transpose()?;

        let role = Role::new(
            builder,
            &construct_id(&[id, "ServiceRole"]),
            RoleProps::new(ServicePrincipal::new("lambda.amazonaws.com"))
                .managed_policy("service-role/AWSLambdaBasicExecutionRole"),
        )?;

        let code = props.code.to_value(builder, id)?;
        let environment = (!props.environment.is_empty())
            .then(|| Value::map([("Variables", Value::Map(props.environment))]));

        let draft = ResourceDraft::new(id, "AWS::Lambda::Function")
            .property("Code", code)
            .property("Handler", props.handler)
            .property("Runtime", props.runtime.name())
            .property("Role", role.arn())
            .property(
                "Architectures",
                Value::List(vec![Value::string(props.architecture.name())]),
            )
            .property_opt("Timeout", timeout)
            .property_opt("MemorySize", props.memory_size)
            .property_opt("Environment", environment)
            .property_opt("Description", props.description)
            .depends_on(role.id().clone());

        let handle = builder.add(draft)?;
        Ok(Self { handle, role })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    pub fn arn(&self) -> Value {
        self.handle.attribute("Arn")
    }

    pub fn name(&self) -> Value {
        self.handle.reference()
    }

    /// Execution role
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Grant the execution role an extra statement
    pub fn add_to_role_policy(
        &self,
        builder: &mut StackBuilder,
        statement: PolicyStatement,
    ) -> Result<ResourceHandle> {
        self.role.add_to_policy(builder, statement)
    }

    /// Adds an `AWS::Lambda::Permission` named `<function id><id>`.
    pub fn add_permission(
        &self,
        builder: &mut StackBuilder,
        id: &str,
        permission: Permission,
    ) -> Result<ResourceHandle> {
        let draft = ResourceDraft::new(
            construct_id(&[self.id().as_str(), id]),
            "AWS::Lambda::Permission",
        )
        .property(
            "Action",
            permission
                .action
                .unwrap_or_else(|| "lambda:InvokeFunction".to_string()),
        )
        .property("FunctionName", self.arn())
        .property("Principal", permission.principal.service())
        .property_opt("SourceArn", permission.source_arn)
        .property_opt("SourceAccount", permission.source_account);

        builder.add(draft)
    }
}

/// Invocation permission for [`Function::add_permission`]
#[derive(Debug, Clone)]
pub struct Permission {
    pub principal: ServicePrincipal,
    pub action: Option<String>,
    pub source_arn: Option<Value>,
    pub source_account: Option<Value>,
}

impl Permission {
    pub fn new(principal: ServicePrincipal) -> Self {
        Self {
            principal,
            action: None,
            source_arn: None,
            source_account: None,
        }
    }

    pub fn source_arn(mut self, arn: Value) -> Self {
        self.source_arn = Some(arn);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::Environment;

    fn code_hook(builder: &mut StackBuilder) -> Function {
        let mut props = FunctionProps::new(
            Runtime::Python39,
            Code::from_asset("resources/lexBot"),
            "index.lambda_handler",
        );
        props.architecture = Architecture::Arm64;
        props.timeout = Some(Duration::from_secs(60));
        Function::new(builder, "lexCodeHook", props).unwrap()
    }

    #[test]
    fn test_function_creates_service_role_and_asset() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let function = code_hook(&mut builder);

        assert_eq!(builder.len(), 2);
        assert!(builder.descriptor("lexCodeHookServiceRole").is_some());

        let descriptor = builder.descriptor("lexCodeHook").unwrap();
        assert_eq!(descriptor.property("Runtime"), Some(&Value::string("python3.9")));
        assert_eq!(descriptor.property("Timeout"), Some(&Value::int(60)));
        assert!(descriptor.depends_on().contains(function.role().id()));
        assert_eq!(descriptor.property("Code").unwrap().assets().len(), 2);

        let stack = builder.assemble().unwrap();
        assert_eq!(stack.assets().count(), 1);
        assert_eq!(stack.asset("lexCodeHookCode").unwrap().path, PathBuf::from("resources/lexBot"));
    }

    #[test]
    fn test_add_permission() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let function = code_hook(&mut builder);
        let handle = function
            .add_permission(
                &mut builder,
                "Lex Invocation",
                Permission::new(ServicePrincipal::new("lexv2.amazonaws.com")),
            )
            .unwrap();

        assert_eq!(handle.id().as_str(), "lexCodeHookLexInvocation");
        let descriptor = builder.descriptor("lexCodeHookLexInvocation").unwrap();
        assert_eq!(
            descriptor.property("Action"),
            Some(&Value::string("lambda:InvokeFunction"))
        );
        assert!(descriptor.property("SourceArn").is_none());
    }

    #[test]
    fn test_inline_code() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        Function::new(
            &mut builder,
            "Inline",
            FunctionProps::new(Runtime::Nodejs20, Code::from_inline("exports.handler = () => {}"), "index.handler"),
        )
        .unwrap();

        let stack = builder.assemble().unwrap();
        assert_eq!(stack.assets().count(), 0);
    }

    #[test]
    fn test_timeout_out_of_range() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let mut props = FunctionProps::new(Runtime::Python312, Code::from_inline("pass"), "index.handler");
        props.timeout = Some(Duration::from_secs(u64::MAX));

        let err = Function::new(&mut builder, "TooSlow", props).unwrap_err();
        assert!(matches!(err, StackError::Validation { ref logical_id, .. } if logical_id == "TooSlow"));
        assert!(builder.is_empty());
    }
}
