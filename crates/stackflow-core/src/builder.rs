//! スタックビルダー
//!
//! 記述子の登録（Resource Descriptor）、属性参照の発行（Reference Resolver）、
//! 依存グラフの検証（Graph Assembler）を担当します。
//!
//! 暗黙の「現在のスタック」は持たず、全ての構築呼び出しは
//! `&mut StackBuilder` を明示的に受け取ります。

use crate::error::{Result, StackError};
use crate::graph::topological_order;
use crate::kind::KindRegistry;
use crate::model::{
    AssetPart, AssetReference, AssetSource, Attribute, Descriptor, Edge, Environment, LogicalId,
    PseudoParameter, Reference, ResourceDraft, Stack, StackState, Value,
};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// 登録済みリソースへのハンドル
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    id: LogicalId,
    kind: String,
}

impl ResourceHandle {
    pub fn id(&self) -> &LogicalId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// 主識別子（`Ref`）への遅延参照
    pub fn reference(&self) -> Value {
        Value::Deferred(Reference {
            target: self.id.clone(),
            attribute: Attribute::Ref,
        })
    }

    /// 属性への遅延参照（種別スキーマによる検証なし）
    ///
    /// 型付きコンストラクトが既知の属性を参照するときに使います。
    /// 任意の属性名には [`StackBuilder::get_att`] を使ってください。
    pub fn attribute(&self, name: &str) -> Value {
        Value::Deferred(Reference {
            target: self.id.clone(),
            attribute: Attribute::GetAtt(name.to_string()),
        })
    }
}

/// 登録済みアセットへのハンドル
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    id: String,
}

impl AssetHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// ステージングバケット名
    pub fn bucket_name(&self) -> Value {
        Value::Asset(AssetReference {
            asset: self.id.clone(),
            part: AssetPart::BucketName,
        })
    }

    /// バケット内のオブジェクトキー
    pub fn object_key(&self) -> Value {
        Value::Asset(AssetReference {
            asset: self.id.clone(),
            part: AssetPart::ObjectKey,
        })
    }
}

/// 未組み立てのスタック
#[derive(Debug, Clone)]
pub struct StackBuilder {
    name: String,
    description: Option<String>,
    environment: Environment,
    registry: KindRegistry,
    descriptors: IndexMap<LogicalId, Descriptor>,
    edges: BTreeSet<Edge>,
    assets: IndexMap<String, AssetSource>,
    warnings: Vec<String>,
}

impl StackBuilder {
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            description: None,
            environment,
            registry: KindRegistry::builtin(),
            descriptors: IndexMap::new(),
            edges: BTreeSet::new(),
            assets: IndexMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn state(&self) -> StackState {
        StackState::Unbuilt
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn descriptor(&self, id: &str) -> Option<&Descriptor> {
        self.descriptors.get(&LogicalId::new(id))
    }

    /// 登録済みリソースのハンドルを論理IDから取得
    pub fn handle(&self, id: &str) -> Option<ResourceHandle> {
        self.descriptors.get(&LogicalId::new(id)).map(|d| ResourceHandle {
            id: d.logical_id().clone(),
            kind: d.kind().to_string(),
        })
    }

    /// ソフト検証で記録された警告
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// 記録済みの依存エッジ
    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    /// リソースを検証して登録
    pub fn add(&mut self, draft: ResourceDraft) -> Result<ResourceHandle> {
        let id = draft.logical_id.clone();

        id.validate()
            .map_err(|reason| StackError::validation(id.as_str(), reason))?;

        if !KindRegistry::is_well_formed(&draft.kind) {
            return Err(StackError::validation(
                id.as_str(),
                format!("リソース種別の書式が不正です: {}", draft.kind),
            ));
        }

        if self.descriptors.contains_key(&id) {
            return Err(StackError::validation(
                id.as_str(),
                format!("論理IDがスタック '{}' 内で重複しています", self.name),
            ));
        }

        if let Some(schema) = self.registry.get(&draft.kind) {
            let missing = schema.missing_properties(&draft.properties);
            if !missing.is_empty() {
                return Err(StackError::validation(
                    id.as_str(),
                    format!(
                        "{} の必須プロパティが不足しています: {}",
                        draft.kind,
                        missing.join(", ")
                    ),
                ));
            }
        }

        let mut targets: BTreeSet<LogicalId> = BTreeSet::new();
        for reference in draft.properties.values().flat_map(Value::references) {
            self.check_target(&id, &reference.target)?;
            self.check_attribute(reference);
            targets.insert(reference.target.clone());
        }

        for dependency in &draft.depends_on {
            self.check_target(&id, dependency)?;
            targets.insert(dependency.clone());
        }

        for asset in draft.properties.values().flat_map(Value::assets) {
            if !self.assets.contains_key(&asset.asset) {
                return Err(StackError::UnresolvedReference {
                    from: id.to_string(),
                    target: format!("asset:{}", asset.asset),
                    stack: self.name.clone(),
                });
            }
        }

        for target in targets {
            self.edges.insert(Edge {
                from: id.clone(),
                to: target,
            });
        }

        let handle = ResourceHandle {
            id: id.clone(),
            kind: draft.kind.clone(),
        };
        debug!(stack = %self.name, logical_id = %id, kind = %draft.kind, "Registered descriptor");
        self.descriptors.insert(id, Descriptor::from_draft(draft));
        Ok(handle)
    }

    fn check_target(&self, from: &LogicalId, target: &LogicalId) -> Result<()> {
        if target == from {
            return Err(StackError::CyclicDependency {
                path: vec![from.to_string(), target.to_string()],
            });
        }
        if !self.descriptors.contains_key(target) {
            return Err(StackError::UnresolvedReference {
                from: from.to_string(),
                target: target.to_string(),
                stack: self.name.clone(),
            });
        }
        Ok(())
    }

    /// 未知の属性名はソフト警告として記録
    fn check_attribute(&mut self, reference: &Reference) {
        let Attribute::GetAtt(name) = &reference.attribute else {
            return;
        };
        let Some(kind) = self.descriptors.get(&reference.target).map(|d| d.kind()) else {
            return;
        };
        if let Some(schema) = self.registry.get(kind)
            && !schema.has_attribute(name)
        {
            let message = format!(
                "{} ({}) には属性 '{}' が定義されていません",
                reference.target, kind, name
            );
            warn!(stack = %self.name, target = %reference.target, attribute = %name, "Unknown attribute");
            if !self.warnings.contains(&message) {
                self.warnings.push(message);
            }
        }
    }

    /// リソースの主識別子（`Ref`）への遅延参照
    pub fn reference(&self, handle: &ResourceHandle) -> Value {
        handle.reference()
    }

    /// 名前付き属性への遅延参照
    ///
    /// 種別スキーマにない属性名は警告のみで、値はそのまま返します。
    pub fn get_att(&mut self, handle: &ResourceHandle, attribute: impl Into<String>) -> Value {
        let reference = Reference {
            target: handle.id.clone(),
            attribute: Attribute::GetAtt(attribute.into()),
        };
        self.check_attribute(&reference);
        Value::Deferred(reference)
    }

    /// 擬似パラメータ、または環境が確定していればその値
    pub fn account(&self) -> Value {
        match &self.environment.account {
            Some(account) => Value::string(account.clone()),
            None => Value::Pseudo(PseudoParameter::AccountId),
        }
    }

    pub fn region(&self) -> Value {
        match &self.environment.region {
            Some(region) => Value::string(region.clone()),
            None => Value::Pseudo(PseudoParameter::Region),
        }
    }

    pub fn partition(&self) -> Value {
        Value::Pseudo(PseudoParameter::Partition)
    }

    /// 明示的な依存エッジを追加（`from` は `to` の後に作られる）
    pub fn add_dependency(&mut self, from: &ResourceHandle, to: &ResourceHandle) -> Result<()> {
        if !self.descriptors.contains_key(&from.id) {
            return Err(StackError::UnresolvedReference {
                from: to.id.to_string(),
                target: from.id.to_string(),
                stack: self.name.clone(),
            });
        }
        self.check_target(&from.id, &to.id)?;
        self.edges.insert(Edge {
            from: from.id.clone(),
            to: to.id.clone(),
        });
        Ok(())
    }

    /// アセットを登録
    pub fn add_asset(&mut self, source: AssetSource) -> Result<AssetHandle> {
        if self.assets.contains_key(&source.id) {
            return Err(StackError::validation(
                source.id.clone(),
                "アセットIDが重複しています",
            ));
        }
        let handle = AssetHandle {
            id: source.id.clone(),
        };
        debug!(stack = %self.name, asset = %source.id, path = %source.path.display(), "Registered asset");
        self.assets.insert(source.id.clone(), source);
        Ok(handle)
    }

    /// 組み立て前にリソースを取り除く
    ///
    /// 取り除いたリソースを参照している記述子が残っている場合、
    /// `assemble` が `UnresolvedReference` を返します。
    pub fn remove(&mut self, id: &LogicalId) -> Option<Descriptor> {
        let removed = self.descriptors.shift_remove(id)?;
        self.edges.retain(|e| &e.from != id);
        debug!(stack = %self.name, logical_id = %id, "Removed descriptor");
        Some(removed)
    }

    /// 参照を検証し、非巡回であることを確認してスタックを組み立てる
    #[tracing::instrument(skip(self), fields(stack = %self.name))]
    pub fn assemble(self) -> Result<Stack> {
        for edge in &self.edges {
            if !self.descriptors.contains_key(&edge.to) {
                return Err(StackError::UnresolvedReference {
                    from: edge.from.to_string(),
                    target: edge.to.to_string(),
                    stack: self.name.clone(),
                });
            }
        }

        let nodes: Vec<LogicalId> = self.descriptors.keys().cloned().collect();
        let sorted = topological_order(&nodes, &self.edges).map_err(|path| {
            StackError::CyclicDependency {
                path: path.iter().map(|p| p.to_string()).collect(),
            }
        })?;

        info!(
            descriptors = self.descriptors.len(),
            edges = self.edges.len(),
            waves = sorted.waves.len(),
            warnings = self.warnings.len(),
            "Stack assembled"
        );

        Ok(Stack {
            name: self.name,
            description: self.description,
            environment: self.environment,
            descriptors: self.descriptors,
            edges: self.edges,
            assets: self.assets,
            order: sorted.order,
            waves: sorted.waves,
            warnings: self.warnings,
            state: StackState::Assembled,
        })
    }
}
