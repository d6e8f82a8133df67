//! The arena that wires meta-layers into a DAG, aggregates their spaces and
//! builds them into layer graphs.
use std::collections::{BTreeMap, HashMap, HashSet};
use serde::{Deserialize, Serialize};
use layer_graph::TensorRef;
use crate::distributions::ParameterValue;
use crate::error::{MetaModelError, Result};
use crate::meta_layers::{AnyMetaLayer, Inputs, MetaLayer};
use crate::namespace::{Namespace, Namespacer};
use crate::space::{Assignment, LocalParameters, Space};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Cached result of space aggregation for one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedSpace {
    /// Namespaced declarations of this node and all of its ancestors.
    pub space: Space,
    /// Local parameters whose range collapsed to a single value.
    pub defaults: BTreeMap<String, ParameterValue>,
    /// Local name to namespaced key, for the parameters left in `space`.
    pub lookup: Vec<(String, String)>
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetaNode<L> {
    pub layer: L,
    pub namespace: Namespace,
    predecessors: Option<Vec<LayerId>>,
    rendered: Option<RenderedSpace>
}

impl<L> MetaNode<L> {
    pub fn predecessors(&self) -> &[LayerId] {
        self.predecessors.as_deref().unwrap_or(&[])
    }

    pub fn is_connected(&self) -> bool {
        self.predecessors.is_some()
    }

    pub fn rendered(&self) -> Option<&RenderedSpace> {
        self.rendered.as_ref()
    }
}

/// Arena of meta-layers addressed by [`LayerId`].
///
/// The build memo lives beside the nodes and is never serialized; a
/// deserialized graph starts out unbuilt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetaGraph<L = AnyMetaLayer> {
    nodes: Vec<MetaNode<L>>,
    namespacer: Namespacer,
    #[serde(skip)]
    memo: HashMap<LayerId, TensorRef>
}

impl<L> Default for MetaGraph<L> {
    fn default() -> Self {
        Self::with_namespacer(Namespacer::default())
    }
}

impl<L> MetaGraph<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self::with_namespacer(Namespacer::new(separator))
    }

    fn with_namespacer(namespacer: Namespacer) -> Self {
        Self {
            nodes: vec![],
            namespacer,
            memo: HashMap::new()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = LayerId> {
        (0..self.nodes.len()).map(LayerId)
    }

    pub fn node(&self, id: LayerId) -> Result<&MetaNode<L>> {
        self.nodes.get(id.0).ok_or(MetaModelError::UnknownLayer(id))
    }

    fn node_mut(&mut self, id: LayerId) -> Result<&mut MetaNode<L>> {
        self.nodes.get_mut(id.0).ok_or(MetaModelError::UnknownLayer(id))
    }

    pub fn layer(&self, id: LayerId) -> Result<&L> {
        Ok(&self.node(id)?.layer)
    }

    pub fn namespace(&self, id: LayerId) -> Result<&Namespace> {
        Ok(&self.node(id)?.namespace)
    }

    pub fn predecessors(&self, id: LayerId) -> Result<&[LayerId]> {
        Ok(self.node(id)?.predecessors())
    }

    /// Starts a fresh namespace scope by zeroing the id counters.
    ///
    /// Layers added afterwards collide with live layers of the same type, so
    /// this is only useful on an empty graph or before splicing in layers of
    /// types not yet present.
    pub fn new_namespace_scope(&mut self) {
        log::debug!("Resetting namespace counters");
        self.namespacer.reset();
    }

    /// Every node reachable from `id` through predecessors, `id` included.
    pub fn ancestors(&self, id: LayerId) -> Result<Vec<LayerId>> {
        let mut visited = HashSet::new();
        let mut order = vec![];
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !visited.insert(next) {
                continue;
            }
            order.push(next);
            stack.extend(self.predecessors(next)?.iter().rev().copied());
        }
        Ok(order)
    }

    pub fn is_built(&self, id: LayerId) -> bool {
        self.memo.contains_key(&id)
    }

    /// Clears the build memo for `id` and all of its ancestors.
    pub fn reset(&mut self, id: LayerId) -> Result<()> {
        let ancestors = self.ancestors(id)?;
        for ancestor in &ancestors {
            self.memo.remove(ancestor);
        }
        log::trace!("Reset {} node(s) below {:?}", ancestors.len(), id);
        Ok(())
    }

    pub fn reset_all(&mut self) {
        self.memo.clear();
    }
}

impl<L: MetaLayer> MetaGraph<L> {
    /// Re-checks the bounds of every meta-layer, e.g. after deserializing.
    pub fn validate(&self) -> Result<()> {
        self.nodes.iter().try_for_each(|x| x.layer.validate())
    }

    /// Adds an unconnected meta-layer under a freshly allocated namespace.
    pub fn add(&mut self, layer: impl Into<L>) -> Result<LayerId> {
        let layer = layer.into();
        layer.validate()?;
        let namespace = self.namespacer.allocate(layer.type_name())?;
        if self.nodes.iter().any(|x| x.namespace == namespace) {
            return Err(MetaModelError::NamespaceCollision(namespace.prefix()));
        }
        let id = LayerId(self.nodes.len());
        log::trace!("Added {} as {:?}", namespace, id);
        self.nodes.push(MetaNode {
            layer,
            namespace,
            predecessors: None,
            rendered: None,
        });
        Ok(id)
    }

    /// Sets the predecessors of `id`. Allowed once per node, and only before
    /// its space has been rendered.
    pub fn connect(&mut self, id: LayerId, predecessors: &[LayerId]) -> Result<()> {
        let node = self.node(id)?;
        if node.is_connected() {
            return Err(MetaModelError::AlreadyConnected(id));
        }
        if node.rendered.is_some() {
            return Err(MetaModelError::AlreadyRendered(id));
        }
        for predecessor in predecessors {
            self.node(*predecessor)?;
            if self.ancestors(*predecessor)?.contains(&id) {
                return Err(MetaModelError::CycleDetected(id));
            }
        }
        self.node_mut(id)?.predecessors = Some(predecessors.to_vec());
        Ok(())
    }

    /// Adds a meta-layer and connects it in one step.
    pub fn push(&mut self, layer: impl Into<L>, predecessors: &[LayerId]) -> Result<LayerId> {
        let id = self.add(layer)?;
        self.connect(id, predecessors)?;
        Ok(id)
    }

    fn render(&mut self, id: LayerId) -> Result<()> {
        if self.node(id)?.rendered.is_some() {
            return Ok(());
        }
        let predecessors = self.predecessors(id)?.to_vec();
        let mut rendered = RenderedSpace::default();
        for predecessor in predecessors {
            self.render(predecessor)?;
            if let Some(upstream) = &self.node(predecessor)?.rendered {
                rendered.space.extend(upstream.space.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        let node = self.node(id)?;
        for (local, declaration) in node.layer.space() {
            match declaration.fixed_value() {
                Some(value) => {
                    rendered.defaults.insert(local, value);
                }
                None => {
                    let key = node.namespace.key(&local);
                    rendered.lookup.push((local, key.clone()));
                    rendered.space.insert(key, declaration);
                }
            }
        }
        log::debug!(
            "Rendered space of {}: {} key(s), {} default(s)",
            node.namespace,
            rendered.space.len(),
            rendered.defaults.len()
        );
        self.node_mut(id)?.rendered = Some(rendered);
        Ok(())
    }

    /// Aggregate space of `id` and its ancestors, computed once.
    pub fn space(&mut self, id: LayerId) -> Result<&Space> {
        self.render(id)?;
        Ok(&self.rendered_space(id)?.space)
    }

    pub fn rendered_defaults(&mut self, id: LayerId) -> Result<&BTreeMap<String, ParameterValue>> {
        self.render(id)?;
        Ok(&self.rendered_space(id)?.defaults)
    }

    fn rendered_space(&self, id: LayerId) -> Result<&RenderedSpace> {
        self.node(id)?.rendered.as_ref().ok_or(MetaModelError::UnknownLayer(id))
    }

    /// The local parameters `id` is constructed with under `assignment`.
    pub fn local_parameters(&mut self, id: LayerId, assignment: &Assignment) -> Result<LocalParameters> {
        self.render(id)?;
        let node = self.node(id)?;
        let rendered = self.rendered_space(id)?;
        let mut params = LocalParameters::new(node.namespace.prefix());
        for (local, key) in &rendered.lookup {
            if let Some(value) = assignment.get(key) {
                params.insert(local.clone(), value.clone());
            }
        }
        for (local, value) in &rendered.defaults {
            params.insert(local.clone(), value.clone());
        }
        Ok(params)
    }

    /// Builds `id` and its ancestors, reusing anything already built since
    /// the last [`MetaGraph::reset`].
    pub fn build(&mut self, id: LayerId, assignment: &Assignment) -> Result<TensorRef> {
        if let Some(built) = self.memo.get(&id) {
            log::trace!("Reusing built artifact of {:?}", id);
            return Ok(built.clone());
        }
        let predecessors = self.predecessors(id)?.to_vec();
        let mut built = Vec::with_capacity(predecessors.len());
        for predecessor in predecessors {
            built.push(self.build(predecessor, assignment)?);
        }
        let params = self.local_parameters(id, assignment)?;
        let node = self.node(id)?;
        let output = node.layer.construct(Inputs::from(built), &params)?;
        log::debug!("Built {} with output shape {}", node.namespace, output.shape());
        self.memo.insert(id, output.clone());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use layer_graph::operators;
    use crate::distributions::Declaration;

    #[derive(Clone, Debug)]
    enum TestLayer {
        Input,
        Dense {
            low: usize,
            high: usize,
            builds: Rc<Cell<usize>>
        },
        Add,
    }

    impl MetaLayer for TestLayer {
        fn type_name(&self) -> &str {
            match self {
                TestLayer::Input => "Input",
                TestLayer::Dense { .. } => "Dense",
                TestLayer::Add => "Add",
            }
        }

        fn space(&self) -> Space {
            let mut space = Space::new();
            if let TestLayer::Dense { low, high, .. } = self {
                space.insert("units".to_string(), Declaration::integer(*low, *high));
            }
            space
        }

        fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
            match self {
                TestLayer::Input => Ok(operators::input(vec![8], None)?),
                TestLayer::Dense { builds, .. } => {
                    builds.set(builds.get() + 1);
                    let input = inputs.single(params.layer())?;
                    Ok(operators::dense(&input, params.count("units")?, Default::default())?)
                }
                TestLayer::Add => Ok(operators::add(inputs.into_vec())?),
            }
        }
    }

    fn dense(low: usize, high: usize, builds: &Rc<Cell<usize>>) -> TestLayer {
        TestLayer::Dense { low, high, builds: builds.clone() }
    }

    #[test]
    fn test_diamond_builds_shared_ancestor_once() {
        let builds = Rc::new(Cell::new(0));
        let mut graph = MetaGraph::<TestLayer>::new();
        let x = graph.push(TestLayer::Input, &[]).unwrap();
        let shared = graph.push(dense(4, 4, &builds), &[x]).unwrap();
        let left = graph.push(dense(4, 4, &Rc::new(Cell::new(0))), &[shared]).unwrap();
        let right = graph.push(dense(4, 4, &Rc::new(Cell::new(0))), &[shared]).unwrap();
        let sum = graph.push(TestLayer::Add, &[left, right]).unwrap();

        graph.build(sum, &Assignment::new()).unwrap();
        assert_eq!(builds.get(), 1);
        let through_left = graph.build(left, &Assignment::new()).unwrap();
        let through_right = graph.build(right, &Assignment::new()).unwrap();
        let (a, b) = match (through_left.layer(), through_right.layer()) {
            (layer_graph::Layer::Dense { input: a, .. }, layer_graph::Layer::Dense { input: b, .. }) => (a, b),
            _ => panic!("expected dense layers"),
        };
        assert!(std::sync::Arc::ptr_eq(a, b));
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn test_space_merges_diamond_keys_once() {
        let builds = Rc::new(Cell::new(0));
        let mut graph = MetaGraph::<TestLayer>::new();
        let x = graph.push(TestLayer::Input, &[]).unwrap();
        let shared = graph.push(dense(0, 16, &builds), &[x]).unwrap();
        let left = graph.push(dense(0, 16, &builds), &[shared]).unwrap();
        let right = graph.push(dense(2, 2, &builds), &[shared]).unwrap();
        let sum = graph.push(TestLayer::Add, &[left, right]).unwrap();

        let keys: Vec<String> = graph.space(sum).unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["Dense_0_units".to_string(), "Dense_1_units".to_string()]);
        assert_eq!(graph.rendered_defaults(right).unwrap().get("units"), Some(&ParameterValue::Integer(2)));
        let again = graph.space(sum).unwrap().clone();
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_reset_allows_rebuild_with_new_assignment() {
        let builds = Rc::new(Cell::new(0));
        let mut graph = MetaGraph::<TestLayer>::new();
        let x = graph.push(TestLayer::Input, &[]).unwrap();
        let y = graph.push(dense(1, 16, &builds), &[x]).unwrap();
        let mut assignment = Assignment::new();
        assignment.insert("Dense_0_units".to_string(), ParameterValue::Integer(3));
        assert_eq!(graph.build(y, &assignment).unwrap().shape().dims, vec![3]);

        assignment.insert("Dense_0_units".to_string(), ParameterValue::Integer(5));
        // stale until reset
        assert_eq!(graph.build(y, &assignment).unwrap().shape().dims, vec![3]);
        graph.reset(y).unwrap();
        assert!(!graph.is_built(x));
        assert_eq!(graph.build(y, &assignment).unwrap().shape().dims, vec![5]);
        assert_eq!(builds.get(), 2);
    }

    #[test]
    fn test_missing_parameter_surfaces() {
        let builds = Rc::new(Cell::new(0));
        let mut graph = MetaGraph::<TestLayer>::new();
        let x = graph.push(TestLayer::Input, &[]).unwrap();
        let y = graph.push(dense(1, 16, &builds), &[x]).unwrap();
        assert!(matches!(
            graph.build(y, &Assignment::new()),
            Err(MetaModelError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_connect_contract() {
        let builds = Rc::new(Cell::new(0));
        let mut graph = MetaGraph::<TestLayer>::new();
        let a = graph.add(dense(1, 2, &builds)).unwrap();
        let b = graph.push(dense(1, 2, &builds), &[a]).unwrap();
        assert!(matches!(graph.connect(b, &[]), Err(MetaModelError::AlreadyConnected(_))));
        assert!(matches!(graph.connect(a, &[b]), Err(MetaModelError::CycleDetected(_))));
        assert!(matches!(graph.connect(a, &[LayerId(9)]), Err(MetaModelError::UnknownLayer(_))));
    }

    #[test]
    fn test_rendered_node_cannot_be_connected() {
        let builds = Rc::new(Cell::new(0));
        let mut graph = MetaGraph::<TestLayer>::new();
        let x = graph.push(TestLayer::Input, &[]).unwrap();
        let a = graph.push(dense(1, 16, &builds), &[x]).unwrap();
        let b = graph.add(dense(1, 16, &builds)).unwrap();
        assert_eq!(graph.space(b).unwrap().len(), 1);
        assert!(matches!(graph.connect(b, &[a]), Err(MetaModelError::AlreadyRendered(_))));
        assert!(!graph.node(b).unwrap().is_connected());

        let c = graph.add(dense(1, 16, &builds)).unwrap();
        graph.connect(c, &[a]).unwrap();
        let keys: Vec<String> = graph.space(c).unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["Dense_0_units".to_string(), "Dense_2_units".to_string()]);
    }

    #[test]
    fn test_namespace_collision_after_scope_reset() {
        let mut graph = MetaGraph::<TestLayer>::new();
        graph.add(TestLayer::Input).unwrap();
        graph.new_namespace_scope();
        assert!(matches!(graph.add(TestLayer::Input), Err(MetaModelError::NamespaceCollision(_))));
        assert!(graph.add(TestLayer::Add).is_ok());
    }
}
