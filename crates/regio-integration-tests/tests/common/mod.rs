//! Shared fixtures: a steel template graph with two technologies, grid
//! electricity markets, lorry transport, and two car factories consuming
//! steel; plus the matching trade dataset.

#![allow(dead_code)]

use regio_core::{CommodityId, Cutoff, Geography, HsCode, ProcessId, Unit};
use regio_engine::EngineConfig;
use regio_graph::{Exchange, Process, ProcessGraph, ProcessKind};
use regio_trade::{ExportRecord, ImportRecord, InMemoryFeed, TradeDataset, TradeLocation};

pub const STEEL: &str = "steel, low-alloyed";
pub const STEEL_HS: &str = "7207";
pub const BOF: &str = "steel production, converter, low-alloyed";
pub const EAF: &str = "steel production, electric, low-alloyed";
pub const GRID: &str = "electricity, medium voltage";
pub const CAR: &str = "passenger car";

pub fn geo(code: &str) -> Geography {
    Geography::parse(code).unwrap()
}

pub fn steel() -> CommodityId {
    CommodityId::new(STEEL).unwrap()
}

pub fn hs() -> HsCode {
    HsCode::new(STEEL_HS).unwrap()
}

pub fn process(commodity: &str, activity: &str, location: &str, unit: &str) -> Process {
    Process::new(
        ProcessId::new(),
        CommodityId::new(commodity).unwrap(),
        activity,
        geo(location),
        Unit::new(unit).unwrap(),
        ProcessKind::infer(activity),
    )
}

/// Template graph with named handles on the processes tests inspect.
pub struct Templates {
    pub graph: ProcessGraph,
    pub bof_rer: ProcessId,
    pub eaf_rer: ProcessId,
    pub car_fr: ProcessId,
    pub car_de_by: ProcessId,
    pub grid_de: ProcessId,
    pub grid_glo: ProcessId,
}

/// BOF at RER and RoW, EAF at RER only (drawing grid electricity from
/// RER). The RER steel market is 1:1 BOF:EAF, the RoW market all BOF; both
/// carry lorry transport. The FR car buys steel twice (3 from BOF, 4 from
/// EAF), the DE-BY car buys 2 from the RoW BOF.
pub fn templates() -> Templates {
    let grid_de = process(GRID, &format!("market for {GRID}"), "DE", "kilowatt hour");
    let grid_fr = process(GRID, &format!("market for {GRID}"), "FR", "kilowatt hour");
    let grid_rer = process(GRID, &format!("market for {GRID}"), "RER", "kilowatt hour");
    let grid_glo = process(GRID, &format!("market for {GRID}"), "GLO", "kilowatt hour");
    let lorry = process(
        "transport, freight, lorry",
        "market for transport, freight, lorry",
        "GLO",
        "ton kilometer",
    );

    let bof_rer = process(STEEL, BOF, "RER", "kilogram");
    let bof_row = process(STEEL, BOF, "RoW", "kilogram");
    let mut eaf_rer = process(STEEL, EAF, "RER", "kilogram");
    eaf_rer.exchanges.push(Exchange::supplied_by(0.5, &grid_rer));

    let mut market_rer = process(STEEL, &format!("market for {STEEL}"), "RER", "kilogram");
    market_rer.exchanges.push(Exchange::supplied_by(0.5, &bof_rer));
    market_rer.exchanges.push(Exchange::supplied_by(0.5, &eaf_rer));
    market_rer.exchanges.push(Exchange::supplied_by(0.2, &lorry));
    let mut market_row = process(STEEL, &format!("market for {STEEL}"), "RoW", "kilogram");
    market_row.exchanges.push(Exchange::supplied_by(1.0, &bof_row));
    market_row.exchanges.push(Exchange::supplied_by(0.4, &lorry));

    let mut car_fr = process(CAR, "passenger car production", "FR", "unit");
    car_fr.exchanges.push(Exchange::supplied_by(3.0, &bof_rer));
    car_fr.exchanges.push(Exchange::supplied_by(4.0, &eaf_rer));
    let mut car_de_by = process(CAR, "passenger car production", "DE-BY", "unit");
    car_de_by.exchanges.push(Exchange::supplied_by(2.0, &bof_row));

    let handles = Templates {
        graph: ProcessGraph::new(),
        bof_rer: bof_rer.id,
        eaf_rer: eaf_rer.id,
        car_fr: car_fr.id,
        car_de_by: car_de_by.id,
        grid_de: grid_de.id,
        grid_glo: grid_glo.id,
    };
    let graph = ProcessGraph::from_processes(vec![
        grid_de, grid_fr, grid_rer, grid_glo, lorry, bof_rer, bof_row, eaf_rer, market_rer,
        market_row, car_fr, car_de_by,
    ])
    .unwrap();
    Templates { graph, ..handles }
}

pub fn export(exporter: &str, year: u16, quantity: f64) -> ExportRecord {
    ExportRecord {
        hs: hs(),
        year,
        exporter: TradeLocation::parse(exporter).unwrap(),
        quantity: Some(quantity),
        alt_quantity: None,
        unit: Unit::new("tonne").unwrap(),
    }
}

pub fn import(importer: &str, partner: &str, quantity: f64) -> ImportRecord {
    ImportRecord {
        hs: hs(),
        year: 2021,
        importer: TradeLocation::parse(importer).unwrap(),
        partner: TradeLocation::parse(partner).unwrap(),
        quantity: Some(quantity),
        alt_quantity: None,
        unit: Unit::new("tonne").unwrap(),
    }
}

/// Exporters DE 50, CN 30, BR 20. FR imports DE 60, CN 25, BR 15.
pub fn dataset() -> TradeDataset {
    TradeDataset {
        exports: vec![
            export("DE", 2021, 50.0),
            export("CN", 2021, 30.0),
            export("BR", 2021, 20.0),
        ],
        imports: vec![
            import("FR", "DE", 60.0),
            import("FR", "CN", 25.0),
            import("FR", "BR", 15.0),
            import("FR", "W00", 100.0),
        ],
        domestic: vec![],
    }
}

pub fn feed() -> InMemoryFeed {
    InMemoryFeed::new(dataset())
}

/// Cutoff 0.8; DE and FR map to RER.
pub fn config() -> EngineConfig {
    let mut config = EngineConfig::new(Cutoff::new(0.8).unwrap(), [(steel(), hs())].into());
    config.macro_regions.insert(geo("DE"), vec![geo("RER")]);
    config.macro_regions.insert(geo("FR"), vec![geo("RER")]);
    config
}

pub fn steel_supply(process: &Process) -> f64 {
    process
        .technosphere()
        .filter(|e| e.product == STEEL)
        .map(|e| e.amount)
        .sum()
}
