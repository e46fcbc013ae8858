//! Scenario runner — exercises the execution core end to end against a
//! small fixture graph (five people, seven `Knows` edges) and checks each
//! result against the property graph engine's testable properties.
//!
//! Five people: Alice, Bob, Carol, Dan, Eve. Seven directed edges:
//! Alice->Bob, Bob->Dan, Dan->Eve, Bob->Carol, Carol->Bob, Dan->Bob,
//! Bob->Alice. Only Bob and Carol have `age = 35`.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vgraph_error::{ErrorKind, Result};
use vgraph_exec::{
    hash_join_build, hash_join_probe, run_bfs, AggregateFunction, CreateNode, ExecConfig,
    JoinType, MorselDispatcher, PhysicalOperator, QueryContext, SemiMask, SimpleAggregate,
    TaskScheduler,
};
use vgraph_storage::{
    Direction, InMemoryNodeTable, InMemoryRelTable, InMemoryWal, NodeTable, RelTable, Transaction,
    TransactionManager, TransactionMode, Wal,
};
use vgraph_types::{NodeId, Value};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let exit_code = run_cli(std::env::args_os());
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run_cli<I>(os_args: I) -> i32
where
    I: IntoIterator<Item = OsString>,
{
    let raw: Vec<String> = os_args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect();
    let tail = if raw.len() > 1 { &raw[1..] } else { &[] };

    if tail.is_empty() || tail.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return 0;
    }

    let mut run_all = false;
    let mut only: Option<u32> = None;

    let mut i = 0;
    while i < tail.len() {
        match tail[i].as_str() {
            "--all" => run_all = true,
            "--scenario" => {
                i += 1;
                if i >= tail.len() {
                    eprintln!("error: --scenario requires a number 1-6");
                    return 2;
                }
                match tail[i].parse::<u32>() {
                    Ok(n) if (1..=6).contains(&n) => only = Some(n),
                    _ => {
                        eprintln!("error: --scenario must be a number 1-6");
                        return 2;
                    }
                }
            }
            other => {
                eprintln!("error: unknown option `{other}`");
                return 2;
            }
        }
        i += 1;
    }

    if !run_all && only.is_none() {
        eprintln!("error: pass --all or --scenario <n>");
        return 2;
    }

    let scenarios: Vec<(u32, &str, fn() -> Result<()>)> = vec![
        (1, "two-hop scan", scenario_two_hop_scan),
        (2, "shortest path", scenario_shortest_path),
        (3, "hash join with SIP", scenario_hash_join_with_sip),
        (4, "insert with duplicate PK", scenario_duplicate_primary_key),
        (5, "cancellation", scenario_cancellation),
        (6, "parallel determinism of counts", scenario_parallel_determinism),
    ];

    let mut failures = 0u32;
    for (n, name, run) in scenarios {
        if let Some(want) = only {
            if want != n {
                continue;
            }
        }
        match run() {
            Ok(()) => println!("  OK  [{n}] {name}"),
            Err(e) => {
                eprintln!("FAIL  [{n}] {name}: {e}");
                failures += 1;
            }
        }
    }

    i32::from(failures > 0)
}

fn print_help() {
    let text = "\
vgraph-cli — run the execution core's end-to-end scenarios

USAGE:
    vgraph-cli --all
    vgraph-cli --scenario <N>
    vgraph-cli -h | --help

SCENARIOS:
    1  two-hop scan (expect count = 13)
    2  shortest path Alice -> Eve (expect length = 3)
    3  hash join with SIP (expect (Bob,Carol), (Carol,Bob))
    4  insert with duplicate primary key (expect ConstraintViolation)
    5  cancellation under 500ms
    6  parallel determinism of counts across 1/2/8 threads
";
    let _ = io::stdout().write_all(text.as_bytes());
}

// ── Fixture graph ────────────────────────────────────────────────────────

const PERSON_TABLE: u32 = 0;
const KNOWS_TABLE: u32 = 0;

struct Fixture {
    nodes: Arc<dyn NodeTable>,
    rels: Arc<dyn RelTable>,
    manager: TransactionManager,
}

/// Builds the five-person, seven-edge fixture graph shared by every
/// scenario: Alice(0), Bob(1), Carol(2), Dan(3), Eve(4), ages 30/35/35/40/25.
fn build_fixture() -> Fixture {
    let nodes: Arc<dyn NodeTable> = Arc::new(InMemoryNodeTable::new(PERSON_TABLE));
    let rels: Arc<dyn RelTable> = Arc::new(InMemoryRelTable::new(KNOWS_TABLE));
    let manager = TransactionManager::new();
    let writer = manager.begin(TransactionMode::Write);

    let names = ["Alice", "Bob", "Carol", "Dan", "Eve"];
    let ages = [30i64, 35, 35, 40, 25];
    for (name, age) in names.iter().zip(ages) {
        let mut props = HashMap::new();
        props.insert("name".to_string(), Value::String((*name).to_string()));
        props.insert("age".to_string(), Value::Int64(age));
        nodes.insert(&writer, props).unwrap();
    }
    nodes.commit(&writer);

    let edges = [(0, 1), (1, 3), (3, 4), (1, 2), (2, 1), (3, 1), (1, 0)];
    for (src, dst) in edges {
        rels.insert(&writer, NodeId::new(src, PERSON_TABLE), NodeId::new(dst, PERSON_TABLE), HashMap::new())
            .unwrap();
    }
    rels.commit(&writer);

    Fixture { nodes, rels, manager }
}

// ── Scenario 1: two-hop scan ─────────────────────────────────────────────

fn scenario_two_hop_scan() -> Result<()> {
    let fixture = build_fixture();
    let tx = fixture.manager.begin(TransactionMode::ReadOnly);

    let mut count = 0u64;
    for a in 0..5u64 {
        for (b, _) in fixture.rels.neighbors(&tx, NodeId::new(a, PERSON_TABLE), Direction::Forward) {
            count += fixture.rels.neighbors(&tx, b, Direction::Forward).len() as u64;
        }
    }

    if count == 13 {
        Ok(())
    } else {
        Err(vgraph_error::ExecError::runtime(format!("expected count 13, got {count}")))
    }
}

// ── Scenario 2: shortest path ────────────────────────────────────────────

fn scenario_shortest_path() -> Result<()> {
    let fixture = build_fixture();
    let tx = fixture.manager.begin(TransactionMode::ReadOnly);

    let alice = NodeId::new(0, PERSON_TABLE);
    let eve_offset = 4u64;
    let dsts: HashSet<u64> = [eve_offset].into_iter().collect();
    let result = run_bfs(fixture.rels.as_ref(), &tx, alice, Direction::Forward, 1, 10, dsts, 4);

    match result.iter().find(|(offset, _)| *offset == eve_offset) {
        Some((_, length)) if *length == 3 => Ok(()),
        other => Err(vgraph_error::ExecError::runtime(format!("expected Eve reached at length 3, got {other:?}"))),
    }
}

// ── Scenario 3: hash join with sideways information passing ─────────────

fn scenario_hash_join_with_sip() -> Result<()> {
    let fixture = build_fixture();
    let tx = fixture.manager.begin(TransactionMode::ReadOnly);

    let mut age35 = Vec::new();
    for offset in 0..5u64 {
        let id = NodeId::new(offset, PERSON_TABLE);
        if fixture.nodes.get_property(&tx, id, "age")?.to_integer() == 35 {
            age35.push(id);
        }
    }

    let mask = Arc::new(SemiMask::new(5, 2));
    let masker_idx = mask.register_masker();
    let mut build_rows = Vec::new();
    for &id in &age35 {
        let name = fixture.nodes.get_property(&tx, id, "name")?;
        build_rows.push((vec![Value::Node(id)], vec![name]));
    }
    let build = hash_join_build(build_rows, Some((&mask, masker_idx)))?;

    let mut probe_rows = Vec::new();
    for &a in &age35 {
        let a_name = fixture.nodes.get_property(&tx, a, "name")?;
        for (b, _) in fixture.rels.neighbors(&tx, a, Direction::Forward) {
            if mask.is_masked(b.offset as usize) {
                probe_rows.push((vec![Value::Node(b)], vec![a_name.clone()]));
            }
        }
    }
    let rows = hash_join_probe(&build, &probe_rows, JoinType::Inner);

    let mut pairs = Vec::new();
    for row in rows {
        let Value::String(a) = row[0].clone() else {
            return Err(vgraph_error::ExecError::runtime("expected a string name in join output"));
        };
        let Value::String(b) = row[1].clone() else {
            return Err(vgraph_error::ExecError::runtime("expected a string name in join output"));
        };
        pairs.push((a, b));
    }
    pairs.sort();

    let expected = vec![("Bob".to_string(), "Carol".to_string()), ("Carol".to_string(), "Bob".to_string())];
    if pairs == expected {
        Ok(())
    } else {
        Err(vgraph_error::ExecError::runtime(format!("expected {expected:?}, got {pairs:?}")))
    }
}

// ── Scenario 4: insert with duplicate primary key ────────────────────────

fn scenario_duplicate_primary_key() -> Result<()> {
    let fixture = build_fixture();
    let tx = Arc::new(fixture.manager.begin(TransactionMode::Write));
    let wal: Arc<dyn Wal> = Arc::new(InMemoryWal::new());
    let before = fixture.nodes.max_node_offset();

    let mut create = CreateNode::new(
        None,
        Arc::clone(&fixture.nodes),
        tx,
        wal,
        Some("name".into()),
        vec![("name".into(), Value::String("Alice".into()))],
    );
    let ctx = QueryContext::new(1, ExecConfig::default());
    let outcome = create.get_next_tuple(&ctx);

    let after = fixture.nodes.max_node_offset();
    match outcome {
        Err(e) if e.kind == ErrorKind::ConstraintViolation && after == before => Ok(()),
        Err(e) => Err(vgraph_error::ExecError::runtime(format!(
            "expected ConstraintViolation with the node table unchanged, got {e} (offsets {before} -> {after})"
        ))),
        Ok(_) => Err(vgraph_error::ExecError::runtime("expected a constraint violation, insert succeeded".to_string())),
    }
}

// ── Scenario 5: cancellation ──────────────────────────────────────────────

/// Hops to an arbitrary forward neighbor each step, falling back to
/// `start` once it runs off the end of the graph — stands in for a long
/// running traversal over a frontier that never empties on its own.
fn long_running_traversal(ctx: &QueryContext, rels: &dyn RelTable, tx: &Transaction, start: NodeId) -> Result<u64> {
    let mut current = start;
    let mut steps = 0u64;
    loop {
        ctx.check_interrupted()?;
        let neighbors = rels.neighbors(tx, current, Direction::Forward);
        current = neighbors.first().map_or(start, |(n, _)| *n);
        steps += 1;
    }
}

fn scenario_cancellation() -> Result<()> {
    let fixture = build_fixture();
    let tx = fixture.manager.begin(TransactionMode::ReadOnly);

    let mut config = ExecConfig::default();
    config.deadline = Some(Duration::from_millis(50));
    let ctx = QueryContext::new(1, config);

    let started = Instant::now();
    let outcome = long_running_traversal(&ctx, fixture.rels.as_ref(), &tx, NodeId::new(0, PERSON_TABLE));
    let elapsed = started.elapsed();

    match outcome {
        Err(e) if e.is_interrupted() && elapsed < Duration::from_millis(500) => Ok(()),
        Err(e) => Err(vgraph_error::ExecError::runtime(format!(
            "expected Interrupted within 500ms, got {e} after {elapsed:?}"
        ))),
        Ok(steps) => Err(vgraph_error::ExecError::runtime(format!("traversal never stopped on its own after {steps} steps"))),
    }
}

// ── Scenario 6: parallel determinism of counts ───────────────────────────

fn count_persons_with(max_offset: u64, num_threads: usize) -> u64 {
    let dispatcher = Arc::new(MorselDispatcher::new(max_offset));
    let agg = Arc::new(SimpleAggregate::new(vec![AggregateFunction::CountStar]));
    let total = Arc::new(AtomicU64::new(0));
    let scheduler = TaskScheduler::new(num_threads);

    for _ in 0..num_threads {
        let dispatcher = Arc::clone(&dispatcher);
        let agg = Arc::clone(&agg);
        let total = Arc::clone(&total);
        scheduler.spawn(move || {
            let mut local = agg.new_local_state();
            while let Some(morsel) = dispatcher.next_morsel(2) {
                for _ in morsel.start..morsel.end {
                    agg.update(&mut local, &[Value::Null]);
                }
            }
            let finished = agg.finish(&local);
            let Value::Int64(n) = finished[0] else { unreachable!() };
            total.fetch_add(n as u64, Ordering::Relaxed);
        });
    }
    scheduler.run_to_completion();
    total.load(Ordering::Relaxed)
}

fn scenario_parallel_determinism() -> Result<()> {
    let fixture = build_fixture();
    let max_offset = fixture.nodes.max_node_offset();

    let counts: Vec<u64> = [1usize, 2, 8].into_iter().map(|threads| count_persons_with(max_offset, threads)).collect();

    if counts.iter().all(|&c| c == counts[0]) && counts[0] == 5 {
        Ok(())
    } else {
        Err(vgraph_error::ExecError::runtime(format!("counts diverged across thread counts: {counts:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(args: &[&str]) -> i32 {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        run_cli(os_args)
    }

    #[test]
    fn test_help_flag_exits_zero() {
        assert_eq!(run_with(&["vgraph-cli", "--help"]), 0);
        assert_eq!(run_with(&["vgraph-cli", "-h"]), 0);
    }

    #[test]
    fn test_no_args_shows_help() {
        assert_eq!(run_with(&["vgraph-cli"]), 0);
    }

    #[test]
    fn test_unknown_option_exits_two() {
        assert_eq!(run_with(&["vgraph-cli", "--bogus"]), 2);
    }

    #[test]
    fn test_all_scenarios_pass() {
        assert_eq!(run_with(&["vgraph-cli", "--all"]), 0);
    }

    #[test]
    fn test_each_scenario_individually() {
        for n in 1..=6 {
            let n = n.to_string();
            assert_eq!(run_with(&["vgraph-cli", "--scenario", &n]), 0, "scenario {n} failed");
        }
    }

    #[test]
    fn test_bad_scenario_number_exits_two() {
        assert_eq!(run_with(&["vgraph-cli", "--scenario", "9"]), 2);
        assert_eq!(run_with(&["vgraph-cli", "--scenario", "abc"]), 2);
    }

    #[test]
    fn fixture_has_five_people_and_seven_edges() {
        let fixture = build_fixture();
        let tx = fixture.manager.begin(TransactionMode::ReadOnly);
        assert_eq!(fixture.nodes.max_node_offset(), 5);
        let total_out_edges: usize = (0..5)
            .map(|o| fixture.rels.neighbors(&tx, NodeId::new(o, PERSON_TABLE), Direction::Forward).len())
            .sum();
        assert_eq!(total_out_edges, 7);
    }

    #[test]
    fn scenario_functions_are_individually_ok() {
        scenario_two_hop_scan().unwrap();
        scenario_shortest_path().unwrap();
        scenario_hash_join_with_sip().unwrap();
        scenario_duplicate_primary_key().unwrap();
        scenario_cancellation().unwrap();
        scenario_parallel_determinism().unwrap();
    }
}
