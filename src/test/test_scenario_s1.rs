//! S1 (spec §8): an unlimited source feeding a step load through a 50 kW
//! flow-limits node, driven through the full scenario pipeline
//! (`ScenarioInput` -> `ScenarioRunner`) rather than by hand-wiring a
//! `Network`, so the config parsing/building layer (C6/C7) is exercised
//! end to end as well as the atomic models themselves.

use std::collections::HashMap;

use crate::prelude::*;

fn input() -> ScenarioInput {
    let mut components = HashMap::new();
    components.insert(
        "source".to_string(),
        ComponentDef::new(ComponentSpec::Source {
            output_stream: Stream::new("electricity"),
            max_outflow: None,
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
            loads_by_scenario: HashMap::from([("s1".to_string(), "step_load".to_string())]),
        }),
    );

    let networks = HashMap::from([(
        "net1".to_string(),
        vec![
            Connection {
                src_id: "source".into(),
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
        "s1".to_string(),
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
fn sink_steps_through_the_clamped_load_profile() {
    let input = input();
    let runner = ScenarioRunner::new(&input, "s1", &HashMap::new(), 64).unwrap();
    let results = runner.run().unwrap();
    assert!(results.is_good);

    let sink = &results.results["sink"];
    let at = |t: RealTime| sink.iter().filter(|d| d.time_s <= t).last().unwrap().achieved;
    assert_eq!(at(0), 50.0);
    assert_eq!(at(1), 50.0);
    assert_eq!(at(2), 40.0);
    assert_eq!(at(3), 0.0);

    let stats = component_stats(sink, 4, None);
    assert_eq!(stats.energy_kj, 50.0 + 50.0 + 40.0);
    assert_eq!(stats.load_not_served_kj, 0.0);
}
