//! Analysis requests
//!
//! Inspecting a component or node means handing the circuit to an external
//! solver. The editor builds an analysis netlist, then an
//! [`AnalysisDispatcher`] runs the request on a tokio runtime and hands the
//! result back through a channel that the editor drains between gestures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::circuit::{is_ground_node, Circuit};
use crate::parser::netlist::NetlistWriter;

/// Errors reported by analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Circuit is empty")]
    EmptyCircuit,
    #[error("Circuit has {0} disconnected parts")]
    Disconnected(usize),
    #[error("Unknown analysis target {0}")]
    UnknownTarget(String),
    #[error("Analysis task stopped before answering")]
    Cancelled,
    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// What to inspect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Component(String),
    Node(String),
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::Component(name) | Target::Node(name) => name,
        }
    }
}

/// Quantity to compute for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Voltage,
    Current,
    Impedance,
    Admittance,
    NortonAdmittance,
    TheveninImpedance,
    Noise,
}

impl Quantity {
    pub fn symbol(&self) -> &'static str {
        match self {
            Quantity::Voltage => "V",
            Quantity::Current => "I",
            Quantity::Impedance => "Z",
            Quantity::Admittance => "Y",
            Quantity::NortonAdmittance => "Y_N",
            Quantity::TheveninImpedance => "Z_T",
            Quantity::Noise => "Vn",
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One inspection request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub target: Target,
    pub quantity: Quantity,
}

impl AnalysisRequest {
    pub fn component(name: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            target: Target::Component(name.into()),
            quantity,
        }
    }

    pub fn node(name: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            target: Target::Node(name.into()),
            quantity,
        }
    }
}

impl std::fmt::Display for AnalysisRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.quantity, self.target.name())
    }
}

/// External solver
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate `request` against `netlist`, returning the result as text.
    async fn evaluate(&self, netlist: &str, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

/// Build the netlist handed to the solver: component lines only, with a
/// ground wire added when no node is named `0`.
pub fn analysis_netlist(circuit: &Circuit, request: &AnalysisRequest) -> Result<String, AnalysisError> {
    if circuit.is_empty() {
        return Err(AnalysisError::EmptyCircuit);
    }
    let known = match &request.target {
        Target::Component(name) => circuit.component(name).is_some(),
        Target::Node(name) => circuit.node(name).is_some(),
    };
    if !known {
        return Err(AnalysisError::UnknownTarget(request.target.name().to_string()));
    }
    let groups = circuit.connected_groups();
    if groups.len() > 1 {
        return Err(AnalysisError::Disconnected(groups.len()));
    }

    let mut netlist = NetlistWriter::new(circuit).bare().write();
    if !circuit.nodes().any(|n| is_ground_node(&n.name)) {
        if let Some(first) = circuit.nodes().next() {
            let wire = circuit.choose_component_name("W");
            tracing::debug!("No ground node, adding {} {} 0", wire, first.name);
            netlist.push_str(&format!("{} {} 0\n", wire, first.name));
        }
    }
    Ok(netlist)
}

/// Finished analysis
#[derive(Debug)]
pub struct AnalysisCompletion {
    pub id: Uuid,
    pub request: AnalysisRequest,
    pub result: Result<String, AnalysisError>,
}

/// Runs analysis requests off the input thread
pub struct AnalysisDispatcher {
    backend: Arc<dyn AnalysisBackend>,
    runtime: Handle,
    sender: mpsc::UnboundedSender<AnalysisCompletion>,
    receiver: mpsc::UnboundedReceiver<AnalysisCompletion>,
    pending: usize,
}

impl AnalysisDispatcher {
    pub fn new(backend: Arc<dyn AnalysisBackend>, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            backend,
            runtime,
            sender,
            receiver,
            pending: 0,
        }
    }

    /// Number of requests dispatched but not yet collected.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Spawn `request` against `netlist`; the answer arrives later through
    /// [`AnalysisDispatcher::drain`] or [`AnalysisDispatcher::next_completion`].
    pub fn dispatch(&mut self, netlist: String, request: AnalysisRequest) -> Uuid {
        let id = Uuid::new_v4();
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        self.pending += 1;
        tracing::debug!("Dispatching {} to {}", request, backend.name());

        self.runtime.spawn(async move {
            let result = backend.evaluate(&netlist, &request).await;
            let completion = AnalysisCompletion { id, request, result };
            if sender.send(completion).is_err() {
                tracing::debug!("Analysis {} finished after the editor went away", id);
            }
        });
        id
    }

    /// Collect every completion that has arrived, without waiting.
    pub fn drain(&mut self) -> Vec<AnalysisCompletion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            completions.push(completion);
        }
        self.pending = self.pending.saturating_sub(completions.len());
        completions
    }

    /// Wait for the next completion.
    pub async fn next_completion(&mut self) -> Option<AnalysisCompletion> {
        let completion = self.receiver.recv().await?;
        self.pending = self.pending.saturating_sub(1);
        Some(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::headless::EchoBackend;
    use crate::circuit::ComponentType;

    fn divider() -> Circuit {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::VoltageSource, "dc", &["1", "2"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["1", "3"]).unwrap();
        circuit.add_component(ComponentType::Resistor, "", &["3", "2"]).unwrap();
        circuit
    }

    #[test]
    fn test_netlist_adds_ground() {
        let netlist = analysis_netlist(&divider(), &AnalysisRequest::component("R2", Quantity::Voltage)).unwrap();
        assert!(netlist.ends_with("W1 1 0\n"));
    }

    #[test]
    fn test_netlist_errors() {
        let request = AnalysisRequest::component("R1", Quantity::Current);
        assert!(matches!(analysis_netlist(&Circuit::new(), &request), Err(AnalysisError::EmptyCircuit)));

        let mut circuit = divider();
        assert!(matches!(
            analysis_netlist(&circuit, &AnalysisRequest::node("9", Quantity::Voltage)),
            Err(AnalysisError::UnknownTarget(_))
        ));
        circuit.add_component(ComponentType::Resistor, "", &["7", "8"]).unwrap();
        assert!(matches!(analysis_netlist(&circuit, &request), Err(AnalysisError::Disconnected(2))));
    }

    #[tokio::test]
    async fn test_dispatcher_round_trip() {
        let backend = EchoBackend::new();
        let mut dispatcher = AnalysisDispatcher::new(Arc::new(backend.clone()), Handle::current());
        let request = AnalysisRequest::component("R1", Quantity::Impedance);
        let id = dispatcher.dispatch("R1 1 0\n".to_string(), request.clone());
        assert_eq!(dispatcher.pending(), 1);

        let completion = dispatcher.next_completion().await.unwrap();
        assert_eq!(completion.id, id);
        assert_eq!(completion.request, request);
        assert_eq!(completion.result.unwrap(), "Z(R1)");
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(backend.netlists(), vec!["R1 1 0\n"]);
    }
}
