//! # Process Model
//!
//! A [`Process`] is a node producing one reference product (its commodity)
//! at one geography through one activity. Its [`Exchange`]s are the directed
//! edges: exactly one production exchange pointing back at the process,
//! technosphere inputs pointing at supplier processes, and biosphere
//! exchanges pointing at elementary flows.
//!
//! Exchanges carry a copy of the supplier's descriptive metadata (product,
//! activity, geography) so that substitution can scan a process without
//! dereferencing every input.

use serde::{Deserialize, Serialize};

use regio_core::{CommodityId, Geography, ProcessId, Unit};

use crate::error::GraphError;

// ─── Process Kind ────────────────────────────────────────────────────

/// What role a process plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    /// Produces its commodity from inputs (a production technology).
    Transformation,
    /// Mixes suppliers of one commodity for one geography.
    Market,
    /// Mixes markets of one commodity across several geographies.
    MarketGroup,
    /// Routing activity that imports a commodity from another geography.
    Import,
    /// Generated global export-weighted market.
    ProductionMarket,
    /// Generated per-importer consumption market.
    ConsumptionMarket,
}

impl ProcessKind {
    /// Classify a process from its activity name.
    pub fn infer(activity: &str) -> Self {
        if activity.starts_with("export market for") {
            Self::ProductionMarket
        } else if activity.starts_with("consumption market for") {
            Self::ConsumptionMarket
        } else if activity.contains("market group for") {
            Self::MarketGroup
        } else if activity.contains("market for") || activity.contains("generic market") {
            Self::Market
        } else if activity.contains("import from") {
            Self::Import
        } else {
            Self::Transformation
        }
    }

    /// Template markets and market groups.
    pub fn is_market(&self) -> bool {
        matches!(self, Self::Market | Self::MarketGroup)
    }

    /// Markets created by the engine.
    pub fn is_generated_market(&self) -> bool {
        matches!(self, Self::ProductionMarket | Self::ConsumptionMarket)
    }
}

// ─── Exchanges ───────────────────────────────────────────────────────

/// Direction and nature of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeRole {
    /// The reference output of the owning process.
    Production,
    /// An input from another process.
    Technosphere,
    /// An exchange with the environment.
    Biosphere,
}

/// An elementary (environmental) flow, identified by name and compartment path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementaryFlow {
    /// Flow name, e.g. `"Water, river, CA"`.
    pub name: String,
    /// Compartment then sub-compartments, e.g. `["water", "surface water"]`.
    pub categories: Vec<String>,
}

impl ElementaryFlow {
    /// The top-level compartment, if any.
    pub fn compartment(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

/// What an exchange points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeTarget {
    /// Another process in the graph (or the owner, for production).
    Process(ProcessId),
    /// An elementary flow.
    Elementary(ElementaryFlow),
}

/// A directed edge of the process graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Production, technosphere or biosphere.
    pub role: ExchangeRole,
    /// Quantity per unit of the owning process's output.
    pub amount: f64,
    /// Unit of `amount`.
    pub unit: Unit,
    /// Target of the edge.
    pub input: ExchangeTarget,
    /// Reference product of the supplier; empty for biosphere exchanges.
    #[serde(default)]
    pub product: String,
    /// Activity name of the supplier; empty for biosphere exchanges.
    #[serde(default)]
    pub activity: String,
    /// Location of the supplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography: Option<Geography>,
}

impl Exchange {
    /// A technosphere input supplied by `supplier`, carrying its metadata.
    pub fn supplied_by(amount: f64, supplier: &Process) -> Self {
        Self {
            role: ExchangeRole::Technosphere,
            amount,
            unit: supplier.unit.clone(),
            input: ExchangeTarget::Process(supplier.id),
            product: supplier.commodity.as_str().to_string(),
            activity: supplier.activity.clone(),
            geography: Some(supplier.geography.clone()),
        }
    }

    /// A biosphere exchange with an elementary flow.
    pub fn biosphere(amount: f64, unit: Unit, flow: ElementaryFlow) -> Self {
        Self {
            role: ExchangeRole::Biosphere,
            amount,
            unit,
            input: ExchangeTarget::Elementary(flow),
            product: String::new(),
            activity: String::new(),
            geography: None,
        }
    }

    fn production(process: &Process) -> Self {
        Self {
            role: ExchangeRole::Production,
            ..Self::supplied_by(1.0, process)
        }
    }

    /// Redirect this exchange to `supplier`, keeping amount and role.
    pub fn point_to(&mut self, supplier: &Process) {
        self.input = ExchangeTarget::Process(supplier.id);
        self.product = supplier.commodity.as_str().to_string();
        self.activity = supplier.activity.clone();
        self.geography = Some(supplier.geography.clone());
    }

    /// Whether this is a technosphere input.
    pub fn is_technosphere(&self) -> bool {
        self.role == ExchangeRole::Technosphere
    }

    /// Whether this is a biosphere exchange.
    pub fn is_biosphere(&self) -> bool {
        self.role == ExchangeRole::Biosphere
    }

    /// The supplying process, for production and technosphere exchanges.
    pub fn target_process(&self) -> Option<ProcessId> {
        match &self.input {
            ExchangeTarget::Process(id) => Some(*id),
            ExchangeTarget::Elementary(_) => None,
        }
    }

    /// The elementary flow, for biosphere exchanges.
    pub fn elementary_flow(&self) -> Option<&ElementaryFlow> {
        match &self.input {
            ExchangeTarget::Elementary(flow) => Some(flow),
            ExchangeTarget::Process(_) => None,
        }
    }

    /// Display name: supplier activity, or flow name for biosphere exchanges.
    pub fn name(&self) -> &str {
        match &self.input {
            ExchangeTarget::Elementary(flow) => &flow.name,
            ExchangeTarget::Process(_) => &self.activity,
        }
    }
}

// ─── Processes ───────────────────────────────────────────────────────

/// Lookup key of a process: `(commodity, geography, activity)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessKey {
    /// Reference product.
    pub commodity: CommodityId,
    /// Location.
    pub geography: Geography,
    /// Activity name.
    pub activity: String,
}

impl ProcessKey {
    /// Build a key.
    pub fn new(commodity: CommodityId, geography: Geography, activity: impl Into<String>) -> Self {
        Self {
            commodity,
            geography,
            activity: activity.into(),
        }
    }
}

impl std::fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} | {} | {}", self.activity, self.commodity, self.geography)
    }
}

/// A node of the process graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Stable identity.
    pub id: ProcessId,
    /// Reference product.
    pub commodity: CommodityId,
    /// Activity (technology) name.
    pub activity: String,
    /// Location.
    pub geography: Geography,
    /// Unit of the reference product.
    pub unit: Unit,
    /// Role of the process in the graph.
    pub kind: ProcessKind,
    /// Ordered exchanges; exactly one is the production exchange.
    pub exchanges: Vec<Exchange>,
    /// Provenance note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Process {
    /// A process with only its self-referencing production exchange.
    pub fn new(
        id: ProcessId,
        commodity: CommodityId,
        activity: impl Into<String>,
        geography: Geography,
        unit: Unit,
        kind: ProcessKind,
    ) -> Self {
        let mut process = Self {
            id,
            commodity,
            activity: activity.into(),
            geography,
            unit,
            kind,
            exchanges: Vec::new(),
            comment: None,
        };
        process.exchanges.push(Exchange::production(&process));
        process
    }

    /// Attach a provenance comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The lookup key of this process.
    pub fn key(&self) -> ProcessKey {
        ProcessKey::new(
            self.commodity.clone(),
            self.geography.clone(),
            self.activity.clone(),
        )
    }

    /// Check the single self-referencing production exchange.
    pub fn validate(&self) -> Result<(), GraphError> {
        let production: Vec<&Exchange> = self
            .exchanges
            .iter()
            .filter(|e| e.role == ExchangeRole::Production)
            .collect();
        if production.len() != 1 {
            return Err(GraphError::ProductionExchangeCount {
                id: self.id,
                found: production.len(),
            });
        }
        if production[0].target_process() != Some(self.id) {
            return Err(GraphError::ProductionNotSelf(self.id));
        }
        Ok(())
    }

    /// The production exchange, if present.
    pub fn production_exchange(&self) -> Option<&Exchange> {
        self.exchanges
            .iter()
            .find(|e| e.role == ExchangeRole::Production)
    }

    /// Technosphere inputs.
    pub fn technosphere(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter().filter(|e| e.is_technosphere())
    }

    /// Biosphere exchanges.
    pub fn biosphere(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter().filter(|e| e.is_biosphere())
    }

    /// Give the process a new identity and location, rewriting the
    /// production exchange to match.
    pub fn relocate(&mut self, id: ProcessId, geography: Geography) {
        self.id = id;
        self.geography = geography;
        for exchange in self
            .exchanges
            .iter_mut()
            .filter(|e| e.role == ExchangeRole::Production)
        {
            exchange.input = ExchangeTarget::Process(id);
            exchange.geography = Some(self.geography.clone());
        }
    }

    /// Sum of all technosphere input amounts.
    pub fn technosphere_total(&self) -> f64 {
        self.technosphere().map(|e| e.amount).sum()
    }
}
