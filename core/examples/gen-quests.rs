//! Generates a quest file for the oracle with fresh random keys.
//!
//! Usage:
//!   cargo run -p blindquiz-core --example gen-quests -- [sample|<pairs.json>] > quests.json
//!
//! `<pairs.json>` is `[{"question": ..., "answer": ...}]`.

use blindquiz_core::*;
use serde::Deserialize;

#[derive(Deserialize)]
struct Pair {
    question: String,
    answer: String,
}

fn sample() -> Vec<Pair> {
    [
        (
            "In which programming language are smart contracts on Aptos written? [[OPTIONS]]: A) Solidity, B) Rust, C) Move, D) Python",
            "C",
        ),
        (
            "What is the primary benefit of Aptos' parallel transaction processing? [[OPTIONS]]: A) Reduced transaction fees, B) Higher transaction throughput, C) Improved security, D) Increased decentralization",
            "B",
        ),
        (
            "Aptos blockchain was launched in which year? [[OPTIONS]]: A) 2020, B) 2021, C) 2022, D) 2023",
            "C",
        ),
    ]
    .into_iter()
    .map(|(q, a)| Pair {
        question: q.to_string(),
        answer: a.to_string(),
    })
    .collect()
}

fn main() {
    let mode = std::env::args().nth(1).unwrap_or_else(|| "sample".to_string());

    let pairs: Vec<Pair> = match mode.as_str() {
        "sample" => sample(),
        path => {
            let json = std::fs::read_to_string(path).expect("Failed to read question file");
            serde_json::from_str(&json).expect("Failed to parse question file")
        }
    };

    let mut rng = rand::thread_rng();
    let specs: Vec<QuestSpec> = pairs
        .into_iter()
        .map(|p| QuestSpec {
            question: p.question,
            answer: p.answer,
            key: SecretScalar::random(&mut rng).to_decimal(),
        })
        .collect();

    // Same path the oracle takes on load
    let quests = load_quests(&specs, &TryAndIncrement).expect("Generated quest file does not load");

    eprintln!("=== {} quests ===", quests.len());
    for q in &quests {
        eprintln!("  #{}: committed x = {}", q.index, q.committed_point().x_decimal());
    }

    println!("{}", serde_json::to_string_pretty(&specs).unwrap());
}
