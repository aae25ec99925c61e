//! S2 (spec §8): an unlimited diesel source through a 50% converter and the
//! same 50 kW flow-limits/step-load pair as S1, checking that the
//! converter's inverse conversion scales the upstream diesel draw.

use std::collections::HashMap;

use crate::prelude::*;

fn input() -> ScenarioInput {
    let mut components = HashMap::new();
    components.insert(
        "genset".to_string(),
        ComponentDef::new(ComponentSpec::Source {
            output_stream: Stream::new("diesel"),
            max_outflow: None,
        }),
    );
    components.insert(
        "conv".to_string(),
        ComponentDef::new(ComponentSpec::Converter {
            input_stream: Stream::new("diesel"),
            output_stream: Stream::new("electricity"),
            lossflow_stream: None,
            conversion: ConversionSpec::ConstantEfficiency(0.5),
        }),
    );
    components.insert(
        "limit".to_string(),
        ComponentDef::new(ComponentSpec::PassThrough {
            stream: Stream::new("electricity"),
            max_outflow: Some(50.0),
            min_outflow: Some(0.0),
        }),
    );
    components.insert(
        "sink".to_string(),
        ComponentDef::new(ComponentSpec::Load {
            input_stream: Stream::new("electricity"),
            loads_by_scenario: HashMap::from([("s2".to_string(), "step_load".to_string())]),
        }),
    );

    let networks = HashMap::from([(
        "net1".to_string(),
        vec![
            Connection {
                src_id: "genset".into(),
                src_port_type: ConnectionPortType::Outflow,
                src_port_num: 0,
                dst_id: "conv".into(),
                dst_port_type: ConnectionPortType::Inflow,
                dst_port_num: 0,
                stream: Stream::new("diesel"),
            },
            Connection {
                src_id: "conv".into(),
                src_port_type: ConnectionPortType::Outflow,
                src_port_num: 0,
                dst_id: "limit".into(),
                dst_port_type: ConnectionPortType::Inflow,
                dst_port_num: 0,
                stream: Stream::new("electricity"),
            },
            Connection {
                src_id: "limit".into(),
                src_port_type: ConnectionPortType::Outflow,
                src_port_num: 0,
                dst_id: "sink".into(),
                dst_port_type: ConnectionPortType::Inflow,
                dst_port_num: 0,
                stream: Stream::new("electricity"),
            },
        ],
    )]);

    let scenarios = HashMap::from([(
        "s2".to_string(),
        Scenario {
            network_id: "net1".to_string(),
            duration: 4,
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
            max_time: 4,
            random_seed: None,
            fixed_random_frac: None,
        },
        loads: HashMap::from([(
            "step_load".to_string(),
            vec![
                LoadItem::new(0, 160.0),
                LoadItem::new(1, 80.0),
                LoadItem::new(2, 40.0),
                LoadItem::end(3),
            ],
        )]),
        components,
        networks,
        scenarios,
        dist: HashMap::new(),
    }
}

#[test]
fn genset_draws_twice_the_electrical_load_through_the_converter() {
    let input = input();
    let runner = ScenarioRunner::new(&input, "s2", &HashMap::new(), 64).unwrap();
    let results = runner.run().unwrap();
    assert!(results.is_good);

    let sink = &results.results["sink"];
    let at = |series: &[Datum], t: RealTime| series.iter().filter(|d| d.time_s <= t).last().unwrap().achieved;
    assert_eq!(at(sink, 0), 50.0);
    assert_eq!(at(sink, 2), 40.0);
    assert_eq!(at(sink, 3), 0.0);

    let genset = &results.results["genset"];
    assert_eq!(at(genset, 0), 100.0);
    assert_eq!(at(genset, 2), 80.0);
    assert_eq!(at(genset, 3), 0.0);

    // No lossflow stream is configured, so the entire efficiency shortfall
    // (inflow minus outflow) is reported as wasteflow.
    let conv_waste = &results.results["conv-wasteflow"];
    assert_eq!(at(conv_waste, 0), 50.0);
    assert_eq!(at(conv_waste, 2), 40.0);
}
