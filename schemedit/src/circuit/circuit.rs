//! Circuit store
//!
//! Owns the name -> component and name -> node maps and is the only place
//! terminal bindings change, so node connection counts stay exact. Join,
//! split and detach live here because they are rebinding operations.
//!
//! Connectivity queries build a petgraph graph on demand.

use indexmap::IndexMap;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::schema::*;
use crate::core::SchematicError;
use crate::geometry::{Pose, Position};

/// Where the circuit came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitMetadata {
    /// Tool named in the `# Created by` header.
    pub created_by: Option<String>,
    pub version: Option<String>,
}

/// The circuit store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Circuit {
    components: IndexMap<String, Component>,
    nodes: IndexMap<String, Node>,
    pub metadata: CircuitMetadata,
}

impl Circuit {
    /// Create a new empty circuit
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Mutable access for value/attribute edits. Terminal bindings cannot be
    /// changed through this.
    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    fn require_component(&self, name: &str) -> Result<&Component, SchematicError> {
        self.components
            .get(name)
            .ok_or_else(|| SchematicError::not_found("component", name))
    }

    fn require_node(&self, name: &str) -> Result<&Node, SchematicError> {
        self.nodes
            .get(name)
            .ok_or_else(|| SchematicError::not_found("node", name))
    }

    /// First `<prefix><n>` not already in use, n counting from 1.
    pub fn choose_component_name(&self, prefix: &str) -> String {
        (1..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|name| !self.components.contains_key(name))
            .unwrap_or_else(|| prefix.to_string())
    }

    /// First decimal node name not already in use.
    pub fn choose_node_name(&self) -> String {
        self.choose_node_name_excluding(&HashSet::new())
    }

    pub(crate) fn choose_node_name_excluding(&self, reserved: &HashSet<String>) -> String {
        (1..)
            .map(|n: u64| n.to_string())
            .find(|name| !self.nodes.contains_key(name) && !reserved.contains(name))
            .unwrap_or_default()
    }

    /// `0` when free, otherwise the first free ground alias `0_<n>`.
    pub fn choose_ground_node_name(&self, reserved: &HashSet<String>) -> String {
        let free = |name: &String| !self.nodes.contains_key(name) && !reserved.contains(name);
        let ground = GROUND_NODE.to_string();
        if free(&ground) {
            return ground;
        }
        (1..)
            .map(|n: u64| format!("{}_{}", GROUND_NODE, n))
            .find(|name| free(name))
            .unwrap_or(ground)
    }

    /// Add a component with a generated name, binding it to the named
    /// nodes (created when unseen).
    pub fn add_component(
        &mut self,
        ctype: ComponentType,
        kind: &str,
        terminal_nodes: &[&str],
    ) -> Result<&Component, SchematicError> {
        let name = self.choose_component_name(ctype.prefix());
        let component = Component::new(
            name,
            ctype,
            terminal_nodes.iter().map(|n| n.to_string()).collect(),
        )
        .with_kind(kind);
        self.insert_component(component)
    }

    /// Insert an explicitly named component.
    pub fn insert_component(&mut self, component: Component) -> Result<&Component, SchematicError> {
        let expected = component.ctype.arity();
        if component.nodes.len() != expected {
            return Err(SchematicError::InvalidTerminalCount {
                name: component.name.clone(),
                ctype: component.ctype,
                expected,
                actual: component.nodes.len(),
            });
        }
        if self.components.contains_key(&component.name) {
            return Err(SchematicError::DuplicateName(component.name.clone()));
        }
        if !component.ctype.accepts_name(&component.name) {
            return Err(SchematicError::InvalidRename {
                from: component.ctype.to_string(),
                to: component.name.clone(),
                prefix: component.ctype.prefix().to_string(),
            });
        }

        for node_name in &component.nodes {
            self.nodes
                .entry(node_name.clone())
                .or_insert_with(|| Node::new(node_name.clone()))
                .count += 1;
        }

        tracing::debug!("Adding {} {}", component.name, component.nodes.join(" "));
        let name = component.name.clone();
        self.components.insert(name.clone(), component);
        self.recompute_visibility_flags();
        self.require_component(&name)
    }

    /// Remove a component, pruning nodes it was the last user of.
    pub fn remove_component(&mut self, name: &str) -> Result<Component, SchematicError> {
        let component = self
            .components
            .shift_remove(name)
            .ok_or_else(|| SchematicError::not_found("component", name))?;
        for node_name in &component.nodes {
            self.release_node(node_name);
        }
        tracing::debug!("Removed {}", name);
        self.recompute_visibility_flags();
        Ok(component)
    }

    fn release_node(&mut self, node_name: &str) {
        let prune = match self.nodes.get_mut(node_name) {
            Some(node) => {
                node.count = node.count.saturating_sub(1);
                node.count == 0
            }
            None => false,
        };
        if prune {
            self.nodes.shift_remove(node_name);
        }
    }

    fn acquire_node(&mut self, node_name: &str, position: Option<Position>) {
        let node = self
            .nodes
            .entry(node_name.to_string())
            .or_insert_with(|| Node {
                position,
                ..Node::new(node_name)
            });
        node.count += 1;
    }

    /// Point terminal `index` of `component` at `node_name`, creating the
    /// node at `position` if it does not exist yet.
    pub(crate) fn rebind_terminal(
        &mut self,
        component: &str,
        index: usize,
        node_name: &str,
        position: Option<Position>,
    ) -> Result<(), SchematicError> {
        let old = self
            .require_component(component)?
            .nodes
            .get(index)
            .cloned()
            .ok_or_else(|| SchematicError::not_found("terminal", format!("{}[{}]", component, index)))?;
        if old == node_name {
            return Ok(());
        }
        self.acquire_node(node_name, position);
        if let Some(cpt) = self.components.get_mut(component) {
            cpt.nodes[index] = node_name.to_string();
        }
        self.release_node(&old);
        Ok(())
    }

    /// Rename a component. The type prefix must be unchanged; control
    /// references naming the old component follow the rename.
    pub fn rename_component(&mut self, old: &str, new: &str) -> Result<(), SchematicError> {
        let ctype = self.require_component(old)?.ctype;
        if old == new {
            return Ok(());
        }
        if !ctype.accepts_name(new) {
            return Err(SchematicError::InvalidRename {
                from: old.to_string(),
                to: new.to_string(),
                prefix: ctype.prefix().to_string(),
            });
        }
        if self.components.contains_key(new) {
            return Err(SchematicError::DuplicateName(new.to_string()));
        }

        let Some(index) = self.components.get_index_of(old) else {
            return Err(SchematicError::not_found("component", old));
        };
        if let Some(mut component) = self.components.shift_remove(old) {
            component.name = new.to_string();
            let (new_index, _) = self.components.insert_full(new.to_string(), component);
            self.components.move_index(new_index, index);
        }
        for component in self.components.values_mut() {
            if component.control.as_deref() == Some(old) {
                component.control = Some(new.to_string());
            }
        }
        Ok(())
    }

    /// Rename a node, merging into `new` when it already exists.
    pub fn rename_node(&mut self, old: &str, new: &str) -> Result<(), SchematicError> {
        self.require_node(old)?;
        if old == new {
            tracing::error!("Attempted to merge node {} with itself", old);
            return Err(SchematicError::SelfMerge(old.to_string()));
        }
        if self.nodes.contains_key(new) {
            self.node_join(old, Some(new))?;
            return Ok(());
        }

        let Some(index) = self.nodes.get_index_of(old) else {
            return Err(SchematicError::not_found("node", old));
        };
        if let Some(mut node) = self.nodes.shift_remove(old) {
            node.name = new.to_string();
            let (new_index, _) = self.nodes.insert_full(new.to_string(), node);
            self.nodes.move_index(new_index, index);
        }
        for component in self.components.values_mut() {
            for terminal in component.nodes.iter_mut() {
                if terminal == old {
                    *terminal = new.to_string();
                }
            }
        }
        self.recompute_visibility_flags();
        Ok(())
    }

    /// Merge every component on `from` onto `to`. Without `to`, look for
    /// another node at exactly `from`'s position; if there is none nothing
    /// happens. Returns the surviving node.
    pub fn node_join(&mut self, from: &str, to: Option<&str>) -> Result<Option<String>, SchematicError> {
        let from_node = self.require_node(from)?;
        let target = match to {
            Some(to) => {
                if to == from {
                    tracing::error!("Attempted to merge node {} with itself", from);
                    return Err(SchematicError::SelfMerge(from.to_string()));
                }
                self.require_node(to)?;
                to.to_string()
            }
            None => {
                let Some(position) = from_node.position else {
                    return Ok(None);
                };
                match self.node_at(position, Some(from)) {
                    Some(name) => name.to_string(),
                    None => {
                        tracing::debug!("No node coincident with {}, join skipped", from);
                        return Ok(None);
                    }
                }
            }
        };

        let moved = self.nodes.shift_remove(from).map(|n| n.count).unwrap_or(0);
        if let Some(node) = self.nodes.get_mut(&target) {
            node.count += moved;
        }
        for component in self.components.values_mut() {
            for terminal in component.nodes.iter_mut() {
                if terminal == from {
                    *terminal = target.clone();
                }
            }
        }
        tracing::debug!("Joined node {} onto {}", from, target);
        self.recompute_visibility_flags();
        Ok(Some(target))
    }

    /// Move exactly `components` from `existing` onto `new`, leaving the
    /// rest where they are. Returns false (and changes nothing) when no
    /// components are given.
    pub fn node_split(
        &mut self,
        existing: &str,
        new: &str,
        components: &[&str],
    ) -> Result<bool, SchematicError> {
        let position = self.require_node(existing)?.position;
        if components.is_empty() {
            tracing::info!("Split of node {} requested with no components", existing);
            return Ok(false);
        }
        if existing == new {
            tracing::error!("Attempted to split node {} onto itself", existing);
            return Err(SchematicError::SelfMerge(existing.to_string()));
        }
        for name in components {
            let component = self.require_component(name)?;
            if !component.nodes.iter().any(|n| n == existing) {
                return Err(SchematicError::not_found(
                    "terminal",
                    format!("{} on node {}", name, existing),
                ));
            }
        }

        for name in components {
            let indices: Vec<usize> = self.components[*name]
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| *n == existing)
                .map(|(i, _)| i)
                .collect();
            for index in indices {
                self.rebind_terminal(name, index, new, position)?;
            }
        }
        tracing::debug!("Split {:?} from node {} onto {}", components, existing, new);
        self.recompute_visibility_flags();
        Ok(true)
    }

    /// Give a component private nodes so it can be dragged away from shared
    /// junctions. Already-isolated components are left alone (empty result);
    /// otherwise returns the (old, new) node names.
    pub fn cpt_detach(&mut self, name: &str) -> Result<Vec<(String, String)>, SchematicError> {
        let terminals = self.require_component(name)?.nodes.clone();
        let shared = terminals
            .iter()
            .any(|n| self.components_on_node(n).len() > 1);
        if !shared {
            return Ok(Vec::new());
        }

        let mut renames: Vec<(String, String)> = Vec::new();
        let mut reserved = HashSet::new();
        for old in &terminals {
            if renames.iter().any(|(o, _)| o == old) {
                continue;
            }
            let fresh = self.choose_node_name_excluding(&reserved);
            reserved.insert(fresh.clone());
            renames.push((old.clone(), fresh));
        }

        for (index, old) in terminals.iter().enumerate() {
            let position = self.nodes.get(old).and_then(|n| n.position);
            if let Some((_, fresh)) = renames.iter().find(|(o, _)| o == old) {
                let fresh = fresh.clone();
                self.rebind_terminal(name, index, &fresh, position)?;
            }
        }
        tracing::debug!("Detached {}: {:?}", name, renames);
        self.recompute_visibility_flags();
        Ok(renames)
    }

    pub fn set_node_position(&mut self, name: &str, position: Position) -> Result<(), SchematicError> {
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| SchematicError::not_found("node", name))?;
        node.position = Some(position);
        Ok(())
    }

    /// Node at exactly `position`, optionally ignoring one node.
    pub fn node_at(&self, position: Position, exclude: Option<&str>) -> Option<&str> {
        self.nodes
            .values()
            .filter(|n| Some(n.name.as_str()) != exclude)
            .find(|n| n.position.map(|p| p.coincides(&position)).unwrap_or(false))
            .map(|n| n.name.as_str())
    }

    /// Nearest node within `radius` of `position`.
    pub fn closest_node(&self, position: Position, radius: f64) -> Option<&Node> {
        self.nodes
            .values()
            .filter_map(|n| n.position.map(|p| (n, p.distance_to(&position))))
            .filter(|(_, d)| *d < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }

    /// Component whose box contains `position`; the one with the nearest
    /// midpoint wins when boxes overlap.
    pub fn closest_component(&self, position: Position) -> Option<&Component> {
        self.components
            .values()
            .filter_map(|c| {
                let positions = self.terminal_positions(&c.name)?;
                if !c.ctype.is_within_bbox(&positions, c.scale(), position) {
                    return None;
                }
                let pose = c.ctype.pose(&positions, c.scale())?;
                Some((c, pose.midpoint.distance_to(&position)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }

    /// Names of the components with a terminal on `node`.
    pub fn components_on_node(&self, node: &str) -> Vec<&str> {
        self.components
            .values()
            .filter(|c| c.nodes.iter().any(|n| n == node))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Terminal positions, `None` if any terminal node is unplaced.
    pub fn terminal_positions(&self, component: &str) -> Option<Vec<Position>> {
        self.components
            .get(component)?
            .nodes
            .iter()
            .map(|n| self.nodes.get(n).and_then(|node| node.position))
            .collect()
    }

    pub fn pose(&self, component: &str) -> Option<Pose> {
        let cpt = self.components.get(component)?;
        let positions = self.terminal_positions(component)?;
        cpt.ctype.pose(&positions, cpt.scale())
    }

    /// Resolve the control reference of a current-controlled source.
    pub fn resolve_control(&self, component: &str) -> Result<&Component, SchematicError> {
        let cpt = self.require_component(component)?;
        let control = cpt
            .control
            .as_deref()
            .ok_or_else(|| SchematicError::not_found("control for", component))?;
        self.components
            .get(control)
            .ok_or_else(|| SchematicError::not_found("control component", control))
    }

    /// Components that can act as a control reference.
    pub fn possible_control_names(&self) -> Vec<&str> {
        self.components
            .values()
            .filter(|c| c.ctype != ComponentType::Wire)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Extents of all placed nodes as (min, max).
    pub fn bounding_box(&self) -> Option<(Position, Position)> {
        let mut positions = self.nodes.values().filter_map(|n| n.position);
        let first = positions.next()?;
        Some(positions.fold((first, first), |(lo, hi), p| {
            (
                Position::new(lo.x.min(p.x), lo.y.min(p.y)),
                Position::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    /// Recreation record for a component.
    pub fn component_def(&self, name: &str) -> Option<ComponentDef> {
        let component = self.components.get(name)?.clone();
        let terminals = component
            .nodes
            .iter()
            .map(|n| (n.clone(), self.nodes.get(n).and_then(|node| node.position)))
            .collect();
        Some(ComponentDef { component, terminals })
    }

    /// Re-add a component from its recreation record. Nodes that do not
    /// exist are created at the recorded positions.
    pub fn restore_def(&mut self, def: &ComponentDef) -> Result<(), SchematicError> {
        let fresh: Vec<(String, Position)> = def
            .terminals
            .iter()
            .filter(|(name, _)| !self.nodes.contains_key(name))
            .filter_map(|(name, pos)| pos.map(|p| (name.clone(), p)))
            .collect();
        self.insert_component(def.component.clone())?;
        for (name, position) in fresh {
            self.set_node_position(&name, position)?;
        }
        Ok(())
    }

    /// Bind each listed component's terminals to the recorded nodes and
    /// move those nodes to the recorded positions.
    pub(crate) fn apply_terminal_states(
        &mut self,
        states: &[(String, Vec<(String, Position)>)],
    ) -> Result<(), SchematicError> {
        for (component, terminals) in states {
            for (index, (node, position)) in terminals.iter().enumerate() {
                self.rebind_terminal(component, index, node, Some(*position))?;
            }
        }
        for (_, terminals) in states {
            for (node, position) in terminals {
                self.set_node_position(node, *position)?;
            }
        }
        self.recompute_visibility_flags();
        Ok(())
    }

    /// Terminal (node, position) pairs of a component, `None` if unplaced.
    pub(crate) fn terminal_states(&self, component: &str) -> Option<Vec<(String, Position)>> {
        let cpt = self.components.get(component)?;
        let positions = self.terminal_positions(component)?;
        Some(cpt.nodes.iter().cloned().zip(positions).collect())
    }

    /// Recompute the port, drawn and implicit node flags from the
    /// components. Idempotent; run after every structural change.
    pub fn recompute_visibility_flags(&mut self) {
        for node in self.nodes.values_mut() {
            node.port = false;
            node.drawn = true;
            node.implicit = false;
        }

        let mut ports = Vec::new();
        let mut undrawn = Vec::new();
        let mut implicit = Vec::new();
        for component in self.components.values() {
            match component.ctype {
                ComponentType::Port => ports.extend(component.nodes.iter().cloned()),
                ComponentType::Opamp => undrawn.push(component.nodes[1].clone()),
                ComponentType::Wire if !component.kind.is_empty() => {
                    implicit.push(component.nodes[1].clone())
                }
                _ => {}
            }
        }

        for name in ports {
            if let Some(node) = self.nodes.get_mut(&name) {
                node.port = true;
            }
        }
        for name in undrawn {
            if let Some(node) = self.nodes.get_mut(&name) {
                if node.count <= 1 {
                    node.drawn = false;
                }
            }
        }
        for name in implicit {
            if let Some(node) = self.nodes.get_mut(&name) {
                node.implicit = true;
            }
        }
    }

    /// Groups of node names that are electrically connected.
    pub fn connected_groups(&self) -> Vec<Vec<String>> {
        let mut graph: UnGraph<&str, ()> = UnGraph::new_undirected();
        let indices: HashMap<&str, NodeIndex> = self
            .nodes
            .keys()
            .map(|name| (name.as_str(), graph.add_node(name.as_str())))
            .collect();

        let mut grounds = indices
            .iter()
            .filter(|(name, _)| is_ground_node(name))
            .map(|(_, idx)| *idx);
        if let Some(first) = grounds.next() {
            for other in grounds {
                graph.add_edge(first, other, ());
            }
        }

        for component in self.components.values() {
            let mut terminals = component.nodes.iter().filter_map(|n| indices.get(n.as_str()));
            if let Some(&first) = terminals.next() {
                for &other in terminals {
                    graph.add_edge(first, other, ());
                }
            }
        }

        petgraph::algo::kosaraju_scc(&graph)
            .into_iter()
            .map(|group| {
                let mut names: Vec<String> =
                    group.into_iter().map(|idx| graph[idx].to_string()).collect();
                names.sort();
                names
            })
            .collect()
    }

    /// Place nodes without positions by walking the direction hints
    /// (vector from the first to the second body anchor, per component)
    /// outward from already placed nodes. Unreachable groups are seeded to
    /// the right of everything placed so far.
    pub fn layout_unplaced(&mut self, hints: &HashMap<String, Position>) {
        loop {
            let mut progress = false;
            let names: Vec<String> = self.components.keys().cloned().collect();
            for name in &names {
                progress |= self.layout_component(name, hints.get(name).copied());
            }
            if progress {
                continue;
            }

            let Some(seed) = self
                .nodes
                .values()
                .find(|n| n.position.is_none())
                .map(|n| n.name.clone())
            else {
                break;
            };
            let position = match self.bounding_box() {
                Some((_, hi)) => Position::new(hi.x + 4.0, 0.0),
                None => Position::origin(),
            };
            tracing::debug!("Seeding layout at node {} {}", seed, position);
            if let Some(node) = self.nodes.get_mut(&seed) {
                node.position = Some(position);
            }
        }
    }

    fn layout_component(&mut self, name: &str, hint: Option<Position>) -> bool {
        let Some(component) = self.components.get(name) else {
            return false;
        };
        let ctype = component.ctype;
        let terminals = component.nodes.clone();
        let known: Vec<Option<Position>> = terminals
            .iter()
            .map(|n| self.nodes.get(n).and_then(|node| node.position))
            .collect();

        let (first, second) = match ctype.info().body {
            super::kinds::Body::Terminals(a, b) => (known[a], known[b]),
            super::kinds::Body::Midpoint(a, b, c) => {
                let mid = match (known[a], known[b]) {
                    (Some(pa), Some(pb)) => Some(pa.midpoint(&pb)),
                    _ => None,
                };
                (mid, known[c])
            }
        };
        let anchors = match (first, second, hint) {
            (Some(p1), Some(p2), _) => Some((p1, p2)),
            (Some(p1), None, Some(v)) => Some((p1, p1 + v)),
            (None, Some(p2), Some(v)) => Some((p2 - v, p2)),
            _ => None,
        };
        let Some((p1, p2)) = anchors else {
            return false;
        };

        let mut progress = false;
        for (node_name, position) in terminals.iter().zip(ctype.assign_positions(p1, p2)) {
            if let Some(node) = self.nodes.get_mut(node_name) {
                if node.position.is_none() {
                    node.position = Some(position);
                    progress = true;
                }
            }
        }
        progress
    }

    /// Check the store invariants: arity, counts, no orphans, no dangling
    /// bindings.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for component in self.components.values() {
            if component.nodes.len() != component.ctype.arity() {
                return Err(format!("{} has {} terminals", component.name, component.nodes.len()));
            }
            for node in &component.nodes {
                if !self.nodes.contains_key(node) {
                    return Err(format!("{} references missing node {}", component.name, node));
                }
                *counts.entry(node.as_str()).or_default() += 1;
            }
        }
        for node in self.nodes.values() {
            let expected = counts.get(node.name.as_str()).copied().unwrap_or(0);
            if node.count != expected || expected == 0 {
                return Err(format!(
                    "node {} has count {} but {} bindings",
                    node.name, node.count, expected
                ));
            }
        }
        Ok(())
    }

    /// Netlist text of this circuit without preferences.
    pub fn serialize(&self) -> String {
        crate::parser::netlist::NetlistWriter::new(self).write()
    }

    /// Parse netlist text into a circuit. Nodes without a stored position
    /// stay unplaced.
    pub fn deserialize(text: &str) -> Result<Circuit, SchematicError> {
        Ok(crate::parser::netlist::NetlistParser::parse(text)?.circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(circuit: &mut Circuit, ctype: ComponentType, nodes: &[&str], points: &[(f64, f64)]) -> String {
        let name = circuit
            .add_component(ctype, ctype.default_kind(), nodes)
            .expect("add")
            .name
            .clone();
        for (node, (x, y)) in nodes.iter().zip(points) {
            circuit.set_node_position(node, Position::new(*x, *y)).unwrap();
        }
        name
    }

    #[test]
    fn test_add_counts_and_names() {
        let mut circuit = Circuit::new();
        let r1 = place(&mut circuit, ComponentType::Resistor, &["1", "2"], &[(0.0, 0.0), (0.0, 4.0)]);
        let r2 = place(&mut circuit, ComponentType::Resistor, &["2", "3"], &[(0.0, 4.0), (0.0, 8.0)]);
        assert_eq!(r1, "R1");
        assert_eq!(r2, "R2");
        assert_eq!(circuit.node("2").unwrap().count, 2);
        assert!(circuit.check_invariants().is_ok());
    }

    #[test]
    fn test_invalid_terminal_count() {
        let mut circuit = Circuit::new();
        let err = circuit
            .add_component(ComponentType::Mosfet, "nmos", &["1", "2"])
            .unwrap_err();
        assert!(matches!(err, SchematicError::InvalidTerminalCount { expected: 3, actual: 2, .. }));
        assert!(circuit.is_empty());
        assert_eq!(circuit.node_count(), 0);
    }

    #[test]
    fn test_duplicate_insert() {
        let mut circuit = Circuit::new();
        let c = Component::new("R1", ComponentType::Resistor, vec!["1".into(), "2".into()]);
        circuit.insert_component(c.clone()).unwrap();
        assert!(matches!(
            circuit.insert_component(c),
            Err(SchematicError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_choose_name_fills_gaps() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["2", "3"]).unwrap();
        circuit.remove_component("R1").unwrap();
        assert_eq!(circuit.choose_component_name("R"), "R1");
        assert_eq!(circuit.choose_node_name(), "1");
    }

    #[test]
    fn test_rename_component_prefix_rule() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::VoltageSource, "dc", &["1", "0"]).unwrap();
        circuit
            .insert_component(
                Component::new("F1", ComponentType::Cccs, vec!["2".into(), "0".into()])
                    .with_control("V1"),
            )
            .unwrap();
        assert!(matches!(
            circuit.rename_component("V1", "I1"),
            Err(SchematicError::InvalidRename { .. })
        ));
        assert!(matches!(
            circuit.rename_component("V1", "V"),
            Err(SchematicError::InvalidRename { .. })
        ));
        circuit.rename_component("V1", "Vin").unwrap();
        assert_eq!(circuit.resolve_control("F1").unwrap().name, "Vin");
        circuit.rename_component("Vin", "V7").unwrap();
        assert_eq!(circuit.resolve_control("F1").unwrap().name, "V7");
        circuit.remove_component("V7").unwrap();
        assert!(matches!(
            circuit.resolve_control("F1"),
            Err(SchematicError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_node_merges() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["3", "4"]).unwrap();
        circuit.rename_node("2", "out").unwrap();
        assert!(circuit.node("out").is_some());
        circuit.rename_node("3", "out").unwrap();
        assert_eq!(circuit.node("out").unwrap().count, 2);
        assert!(circuit.node("3").is_none());
        assert!(matches!(
            circuit.rename_node("out", "out"),
            Err(SchematicError::SelfMerge(_))
        ));
        assert!(circuit.check_invariants().is_ok());
    }

    #[test]
    fn test_node_join_without_target_is_noop() {
        let mut circuit = Circuit::new();
        place(&mut circuit, ComponentType::Resistor, &["1", "2"], &[(0.0, 0.0), (0.0, 4.0)]);
        let before = circuit.clone();
        assert_eq!(circuit.node_join("1", None).unwrap(), None);
        assert_eq!(circuit, before);
    }

    #[test]
    fn test_node_join_coincident() {
        let mut circuit = Circuit::new();
        place(&mut circuit, ComponentType::Resistor, &["1", "2"], &[(0.0, 0.0), (0.0, 4.0)]);
        place(&mut circuit, ComponentType::Wire, &["3", "4"], &[(0.0, 4.0), (4.0, 4.0)]);
        assert_eq!(circuit.node_join("3", None).unwrap(), Some("2".to_string()));
        assert!(circuit.node("3").is_none());
        assert_eq!(circuit.component("W1").unwrap().nodes(), &["2", "4"]);
        assert_eq!(circuit.node("2").unwrap().count, 2);
        assert!(circuit.check_invariants().is_ok());
    }

    #[test]
    fn test_node_split() {
        let mut circuit = Circuit::new();
        place(&mut circuit, ComponentType::Resistor, &["1", "2"], &[(0.0, 0.0), (0.0, 4.0)]);
        place(&mut circuit, ComponentType::Resistor, &["2", "3"], &[(0.0, 4.0), (0.0, 8.0)]);
        assert!(!circuit.node_split("2", "9", &[]).unwrap());
        assert!(circuit.node_split("2", "9", &["R2"]).unwrap());
        assert_eq!(circuit.node("2").unwrap().count, 1);
        assert_eq!(circuit.node("9").unwrap().count, 1);
        assert_eq!(circuit.node("9").unwrap().position, Some(Position::new(0.0, 4.0)));
        assert!(circuit.check_invariants().is_ok());
    }

    #[test]
    fn test_detach_isolated_is_unchanged() {
        let mut circuit = Circuit::new();
        place(&mut circuit, ComponentType::Resistor, &["1", "2"], &[(0.0, 0.0), (0.0, 4.0)]);
        assert!(circuit.cpt_detach("R1").unwrap().is_empty());
        assert_eq!(circuit.component("R1").unwrap().nodes(), &["1", "2"]);
    }

    #[test]
    fn test_connected_groups() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["2", "3"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["4", "5"]).unwrap();
        let mut groups = circuit.connected_groups();
        groups.sort();
        assert_eq!(groups, vec![vec!["1", "2", "3"], vec!["4", "5"]]);
    }

    #[test]
    fn test_ground_aliases_are_connected() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "0"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Wire, "ground", &["2", "0_1"]).unwrap();
        assert_eq!(circuit.connected_groups().len(), 1);
        assert_eq!(circuit.choose_ground_node_name(&HashSet::new()), "0_2");
    }

    #[test]
    fn test_visibility_flags() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Port, "", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Wire, "ground", &["2", "0"]).unwrap();
        circuit.add_component(ComponentType::Opamp, "opamp", &["3", "4", "5", "6"]).unwrap();
        assert!(circuit.node("1").unwrap().port);
        assert!(circuit.node("0").unwrap().implicit);
        assert!(!circuit.node("4").unwrap().drawn);
        assert!(circuit.node("3").unwrap().drawn);
        let before = circuit.clone();
        circuit.recompute_visibility_flags();
        assert_eq!(circuit, before);
    }

    #[test]
    fn test_layout_from_hints() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["2", "3"]).unwrap();
        let hints = HashMap::from([
            ("R1".to_string(), Position::new(4.0, 0.0)),
            ("R2".to_string(), Position::new(0.0, -4.0)),
        ]);
        circuit.layout_unplaced(&hints);
        assert_eq!(circuit.node("1").unwrap().position, Some(Position::new(0.0, 0.0)));
        assert_eq!(circuit.node("2").unwrap().position, Some(Position::new(4.0, 0.0)));
        assert_eq!(circuit.node("3").unwrap().position, Some(Position::new(4.0, -4.0)));
    }
}
