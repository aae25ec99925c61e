//! S5 (spec §8): a CHP pair. An unlimited natural-gas source feeds a first
//! 50%-efficient converter serving a constant 10 kW electrical load; that
//! converter's lossflow (its unclaimed heat, modeled via `lossflow_stream`)
//! feeds a second 50%-efficient converter serving a 1 kW heat load. Checks
//! that the heat recovery chain balances end to end via
//! [`crate::stats::role_totals`].

use std::collections::HashMap;

use crate::prelude::*;

fn input() -> ScenarioInput {
    let gas = Stream::new("natural_gas");
    let elec = Stream::new("electricity");
    let heat0 = Stream::new("waste_heat");
    let heat1 = Stream::new("heat");

    let mut components = HashMap::new();
    components.insert(
        "gas_main".to_string(),
        ComponentDef::new(ComponentSpec::Source {
            output_stream: gas.clone(),
            max_outflow: None,
        }),
    );
    components.insert(
        "conv0".to_string(),
        ComponentDef::new(ComponentSpec::Converter {
            input_stream: gas,
            output_stream: elec.clone(),
            lossflow_stream: Some(heat0.clone()),
            conversion: ConversionSpec::ConstantEfficiency(0.5),
        }),
    );
    components.insert(
        "conv1".to_string(),
        ComponentDef::new(ComponentSpec::Converter {
            input_stream: heat0,
            output_stream: heat1.clone(),
            lossflow_stream: None,
            conversion: ConversionSpec::ConstantEfficiency(0.5),
        }),
    );
    components.insert(
        "load_elec".to_string(),
        ComponentDef::new(ComponentSpec::Load {
            input_stream: elec,
            loads_by_scenario: HashMap::from([("s5".to_string(), "const_elec".to_string())]),
        }),
    );
    components.insert(
        "load_heat".to_string(),
        ComponentDef::new(ComponentSpec::Load {
            input_stream: heat1,
            loads_by_scenario: HashMap::from([("s5".to_string(), "const_heat".to_string())]),
        }),
    );

    let networks = HashMap::from([(
        "net1".to_string(),
        vec![
            conn("gas_main", ConnectionPortType::Outflow, 0, "conv0", ConnectionPortType::Inflow, 0),
            conn("conv0", ConnectionPortType::Outflow, 0, "load_elec", ConnectionPortType::Inflow, 0),
            conn("conv0", ConnectionPortType::Lossflow, 0, "conv1", ConnectionPortType::Inflow, 0),
            conn("conv1", ConnectionPortType::Outflow, 0, "load_heat", ConnectionPortType::Inflow, 0),
        ],
    )]);

    let scenarios = HashMap::from([(
        "s5".to_string(),
        Scenario {
            network_id: "net1".to_string(),
            duration: 10,
            occurrence_distribution_id: None,
            max_occurrences: 1,
            intensities: HashMap::new(),
            calculate_reliability: false,
        },
    )]);

    ScenarioInput {
        simulation_info: SimulationInfo {
            rate_unit: "kW".into(),
            quantity_unit: "kJ".into(),
            time_unit: TimeUnit::Seconds,
            max_time: 10,
            random_seed: None,
            fixed_random_frac: None,
        },
        loads: HashMap::from([
            ("const_elec".to_string(), vec![LoadItem::new(0, 10.0), LoadItem::end(10)]),
            ("const_heat".to_string(), vec![LoadItem::new(0, 1.0), LoadItem::end(10)]),
        ]),
        components,
        networks,
        scenarios,
        dist: HashMap::new(),
    }
}

fn conn(
    src_id: &str,
    src_port_type: ConnectionPortType,
    src_port_num: u32,
    dst_id: &str,
    dst_port_type: ConnectionPortType,
    dst_port_num: u32,
) -> Connection {
    Connection {
        src_id: src_id.to_string(),
        src_port_type,
        src_port_num,
        dst_id: dst_id.to_string(),
        dst_port_type,
        dst_port_num,
        stream: Stream::new("_ignored_for_this_harness"),
    }
}

fn at(series: &[Datum], t: RealTime) -> Flow {
    series.iter().filter(|d| d.time_s <= t).last().unwrap().achieved
}

#[test]
fn recovered_heat_serves_the_second_load_and_the_chain_balances() {
    let input = input();
    let runner = ScenarioRunner::new(&input, "s5", &HashMap::new(), 64).unwrap();
    let results = runner.run().unwrap();
    assert!(results.is_good);

    // conv0 only ever needs to deliver 10 kW electrical; its gas draw
    // (20 kW) is set purely by that need, independent of how much heat
    // conv1 asks to recover downstream.
    assert_eq!(at(&results.results["gas_main"], 5), 20.0);
    assert_eq!(at(&results.results["load_elec"], 5), 10.0);
    assert_eq!(at(&results.results["conv0-outflow"], 5), 10.0);

    // conv1 asks conv0 for only the 2 kW of heat it needs to cover the
    // 1 kW heat load at 50% efficiency; conv0 has 10 kW of headroom
    // (20 kW in, 10 kW out) and meets that request in full, so none of it
    // spills over into conv0's own wasteflow.
    assert_eq!(at(&results.results["conv0-lossflow"], 5), 2.0);
    assert_eq!(at(&results.results["conv0-wasteflow"], 5), 8.0);
    assert_eq!(at(&results.results["conv1-outflow"], 5), 1.0);
    assert_eq!(at(&results.results["load_heat"], 5), 1.0);
    assert_eq!(at(&results.results["conv1-wasteflow"], 5), 1.0);

    let source_kj = component_stats(&results.results["gas_main"], 10, None).energy_kj;
    let elec_kj = component_stats(&results.results["load_elec"], 10, None).energy_kj;
    let heat_kj = component_stats(&results.results["load_heat"], 10, None).energy_kj;
    let waste0_kj = component_stats(&results.results["conv0-wasteflow"], 10, None).energy_kj;
    let waste1_kj = component_stats(&results.results["conv1-wasteflow"], 10, None).energy_kj;

    assert_eq!(source_kj, 200.0);
    assert_eq!(elec_kj, 100.0);
    assert_eq!(heat_kj, 10.0);
    assert_eq!(waste0_kj, 80.0);
    assert_eq!(waste1_kj, 10.0);
    assert!((source_kj - (elec_kj + heat_kj + waste0_kj + waste1_kj)).abs() < 1e-6);
}
