//! IAM roles, policies and statements

use crate::construct_id;
use indexmap::IndexMap;
use stackflow_core::{
    LogicalId, PseudoParameter, ResourceDraft, ResourceHandle, Result, StackBuilder, Value,
};

const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// AWS service principal such as `lex.amazonaws.com`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal(String);

impl ServicePrincipal {
    pub fn new(service: impl Into<String>) -> Self {
        Self(service.into())
    }

    pub fn service(&self) -> &str {
        &self.0
    }

}

/// Statement principal
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    Service(ServicePrincipal),
    /// Account or role ARN (`{"AWS": ...}`)
    Aws(Value),
}

impl Principal {
    fn to_value(&self) -> Value {
        match self {
            Principal::Service(service) => {
                Value::map([("Service", Value::string(service.service()))])
            }
            Principal::Aws(arn) => Value::map([("AWS", arn.clone())]),
        }
    }
}

impl From<ServicePrincipal> for Principal {
    fn from(service: ServicePrincipal) -> Self {
        Principal::Service(service)
    }
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    pub principal: Option<Principal>,
}

impl PolicyStatement {
    /// Allow statement with the given actions and resources
    pub fn allow<A: Into<String>>(
        actions: impl IntoIterator<Item = A>,
        resources: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().collect(),
            principal: None,
        }
    }

    pub fn with_principal(mut self, principal: impl Into<Principal>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// CloudFormation shape. A single action or resource is written as a scalar.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("Action", scalar_or_list(self.actions.iter().cloned().map(Value::string).collect())),
            ("Effect", Value::string(self.effect.as_str())),
        ];
        if let Some(principal) = &self.principal {
            entries.push(("Principal", principal.to_value()));
        }
        if !self.resources.is_empty() {
            entries.push(("Resource", scalar_or_list(self.resources.clone())));
        }
        Value::map(entries)
    }
}

fn scalar_or_list(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::List(items)
    }
}

/// Policy document (a list of statements)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn to_value(&self) -> Value {
        document_value(self.statements.iter().map(PolicyStatement::to_value).collect())
    }
}

fn document_value(statements: Vec<Value>) -> Value {
    Value::map([
        ("Statement", Value::List(statements)),
        ("Version", Value::string(POLICY_VERSION)),
    ])
}

/// Properties for [`Role::new`]
#[derive(Debug, Clone)]
pub struct RoleProps {
    pub assumed_by: ServicePrincipal,
    /// Inline policies keyed by policy name
    pub inline_policies: IndexMap<String, PolicyDocument>,
    pub managed_policy_arns: Vec<Value>,
    pub description: Option<String>,
}

impl RoleProps {
    pub fn new(assumed_by: ServicePrincipal) -> Self {
        Self {
            assumed_by,
            inline_policies: IndexMap::new(),
            managed_policy_arns: Vec::new(),
            description: None,
        }
    }

    pub fn inline_policy(mut self, name: impl Into<String>, document: PolicyDocument) -> Self {
        self.inline_policies.insert(name.into(), document);
        self
    }

    /// AWS managed policy by name, e.g. `service-role/AWSLambdaBasicExecutionRole`
    pub fn managed_policy(mut self, name: &str) -> Self {
        self.managed_policy_arns.push(Value::join(
            "",
            vec![
                Value::string("arn:"),
                Value::Pseudo(PseudoParameter::Partition),
                Value::string(format!(":iam::aws:policy/{}", name)),
            ],
        ));
        self
    }
}

/// `AWS::IAM::Role`
#[derive(Debug, Clone)]
pub struct Role {
    handle: ResourceHandle,
}

impl Role {
    pub fn new(builder: &mut StackBuilder, id: &str, props: RoleProps) -> Result<Self> {
        let assume = PolicyStatement::allow(["sts:AssumeRole"], Vec::<Value>::new())
            .with_principal(props.assumed_by.clone());

        let policies: Vec<Value> = props
            .inline_policies
            .iter()
            .map(|(name, document)| {
                Value::map([
                    ("PolicyDocument", document.to_value()),
                    ("PolicyName", Value::string(name.clone())),
                ])
            })
            .collect();

        let draft = ResourceDraft::new(id, "AWS::IAM::Role")
            .property("AssumeRolePolicyDocument", document_value(vec![assume.to_value()]))
            .property_opt(
                "ManagedPolicyArns",
                (!props.managed_policy_arns.is_empty()).then(|| Value::List(props.managed_policy_arns)),
            )
            .property_opt("Policies", (!policies.is_empty()).then(|| Value::List(policies)))
            .property_opt("Description", props.description);

        let handle = builder.add(draft)?;
        Ok(Self { handle })
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

    /// Role name (`Ref`)
    pub fn name(&self) -> Value {
        self.handle.reference()
    }

    fn default_policy_id(&self) -> String {
        construct_id(&[self.id().as_str(), "DefaultPolicy"])
    }

    /// Append a statement to the role's default `AWS::IAM::Policy`.
    ///
    /// The policy is created on first use. Later calls re-register it with
    /// the merged statement list, so it stays a single descriptor.
    pub fn add_to_policy(
        &self,
        builder: &mut StackBuilder,
        statement: PolicyStatement,
    ) -> Result<ResourceHandle> {
        let policy_id = self.default_policy_id();
        let mut statements = builder
            .descriptor(&policy_id)
            .and_then(|d| d.property("PolicyDocument"))
            .and_then(|doc| match doc {
                Value::Map(doc) => match doc.get("Statement") {
                    Some(Value::List(items)) => Some(items.clone()),
                    _ => None,
                },
                _ => None,
            })
            .unwrap_or_default();
        builder.remove(&LogicalId::new(policy_id.as_str()));

        statements.push(statement.to_value());
        tracing::debug!(role = %self.id(), statements = statements.len(), "Updating default policy");

        builder.add(
            ResourceDraft::new(policy_id.as_str(), "AWS::IAM::Policy")
                .property("PolicyDocument", document_value(statements))
                .property("PolicyName", policy_id.as_str())
                .property("Roles", Value::List(vec![self.name()])),
        )
    }
}
