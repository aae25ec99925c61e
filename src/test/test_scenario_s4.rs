//! S4 (spec §8): a utility source out for the first 100 hours of a 300 hour
//! run, serving a constant 10 kW load. Drives the `is_schedulable`/schedule
//! path of [`crate::scenario::build_network`] (wrapping the source in an
//! [`crate::model::Model::on_off_switch`]) rather than the bare component
//! wiring S1-S3 exercise, and checks [`crate::stats::downtime_from_schedule`]
//! and `load_not_served_kj` against the outage.

use std::collections::HashMap;

use crate::prelude::*;

const HOUR: RealTime = 3600;

fn input() -> ScenarioInput {
    let mut components = HashMap::new();
    let mut utility = ComponentDef::new(ComponentSpec::Source {
        output_stream: Stream::new("electricity"),
        max_outflow: None,
    });
    utility.failure_modes.push("utility_outage".to_string());
    components.insert("utility".to_string(), utility);
    components.insert(
        "load".to_string(),
        ComponentDef::new(ComponentSpec::Load {
            input_stream: Stream::new("electricity"),
            loads_by_scenario: HashMap::from([("s4".to_string(), "const10".to_string())]),
        }),
    );

    let networks = HashMap::from([(
        "net1".to_string(),
        vec![Connection {
            src_id: "utility".into(),
            src_port_type: ConnectionPortType::Outflow,
            src_port_num: 0,
            dst_id: "load".into(),
            dst_port_type: ConnectionPortType::Inflow,
            dst_port_num: 0,
            stream: Stream::new("electricity"),
        }],
    )]);

    let scenarios = HashMap::from([(
        "s4".to_string(),
        Scenario {
            network_id: "net1".to_string(),
            duration: 300 * HOUR,
            occurrence_distribution_id: None,
            max_occurrences: 1,
            intensities: HashMap::new(),
            calculate_reliability: true,
        },
    )]);

    ScenarioInput {
        simulation_info: SimulationInfo {
            rate_unit: "kW".into(),
            quantity_unit: "kJ".into(),
            time_unit: TimeUnit::Seconds,
            max_time: 300 * HOUR,
            random_seed: None,
            fixed_random_frac: None,
        },
        loads: HashMap::from([(
            "const10".to_string(),
            vec![LoadItem::new(0, 10.0), LoadItem::end(300 * HOUR)],
        )]),
        components,
        networks,
        scenarios,
        dist: HashMap::new(),
    }
}

#[test]
fn outage_for_the_first_hundred_hours_shows_up_as_unserved_load() {
    let input = input();
    let schedule = vec![TimeState::new(0, false), TimeState::new(100 * HOUR, true)];
    let schedules = HashMap::from([("utility".to_string(), schedule.clone())]);

    let runner = ScenarioRunner::new(&input, "s4", &schedules, 64).unwrap();
    let results = runner.run().unwrap();
    assert!(results.is_good);

    let load = &results.results["load"];
    let at = |t: RealTime| load.iter().filter(|d| d.time_s <= t).last().unwrap().achieved;
    assert_eq!(at(0), 0.0);
    assert_eq!(at(50 * HOUR), 0.0);
    assert_eq!(at(100 * HOUR), 10.0);
    assert_eq!(at(250 * HOUR), 10.0);

    let stats = component_stats(load, 300 * HOUR, Some(&schedule));
    assert_eq!(stats.requested_energy_kj, 10.0 * 300.0 * HOUR as f64);
    assert_eq!(stats.energy_kj, 10.0 * 200.0 * HOUR as f64);
    assert_eq!(stats.load_not_served_kj, 3_600_000.0);
    assert_eq!(stats.downtime_s, 100 * HOUR);
    assert_eq!(stats.max_downtime_s, 100 * HOUR);
}
