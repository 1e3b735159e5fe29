//! In-process ledger that executes the `verifier` module's entry functions.
//!
//! Proof bytes are stored but not checked; only the matching rule is enforced.
//! Every handle to the same state shares one history, so several signers can
//! act on one ledger.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use blindquiz_core::profile::{MoveU64, SimpleMapEntry};
use blindquiz_core::{padded_address, CurvePoint, TableRow, UserProfile};
use serde_json::{json, Value};

use super::{EntryCall, Event, Indexer, Ledger, MoveArg, TxnOutcome};
use crate::error::LedgerError;
use crate::verifier::{GameEntry, GameRegistry, QuestionEntry, TableRef, Verifier};

// ── Abort codes ─────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u64)]
pub enum Abort {
    UnknownFunction = 1,
    BadArguments = 2,
    GameNotFound = 3,
    QuestNotFound = 4,
    NoPendingAnswer = 5,
    QuestMismatch = 6,
    BadPoint = 7,
}

// ── Storage ─────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Pending {
    quest: u64,
    reblinded: CurvePoint,
}

#[derive(Default)]
struct State {
    version: u64,
    writes: u64,
    txn_counter: u64,
    registry_owner: Option<String>,
    registry: GameRegistry,
    /// handle → every write ever made, oldest first.
    tables: BTreeMap<String, Vec<TableRow>>,
    /// (game index, student) → student's re-blinded reference point.
    pending: BTreeMap<(u64, String), Pending>,
    fail_next: Option<String>,
}

impl State {
    fn fresh_handle(&mut self) -> String {
        let handle = format!("0x{:x}", 0xa000 + self.tables.len());
        self.tables.insert(handle.clone(), Vec::new());
        handle
    }

    fn write(&mut self, handle: &str, key: Value, value: Option<Value>) {
        let version = self.version;
        self.tables.entry(handle.to_string()).or_default().push(TableRow {
            decoded_key: key,
            decoded_value: value,
            version,
        });
    }

    fn latest(&self, handle: &str, key: &Value) -> Option<Value> {
        self.tables
            .get(handle)?
            .iter()
            .rev()
            .find(|r| &r.decoded_key == key)
            .and_then(|r| r.decoded_value.clone())
    }
}

#[derive(Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<State>>,
    address: String,
    verifier: Verifier,
}

fn u64_arg(call: &EntryCall, i: usize) -> Result<u64, Abort> {
    call.args.get(i).and_then(MoveArg::as_u64).ok_or(Abort::BadArguments)
}

fn text_arg(call: &EntryCall, i: usize) -> Result<String, Abort> {
    call.args
        .get(i)
        .and_then(MoveArg::as_text)
        .map(str::to_string)
        .ok_or(Abort::BadArguments)
}

fn bytes_arg(call: &EntryCall, i: usize) -> Result<String, Abort> {
    text_arg(call, i).map(|h| format!("0x{}", h.strip_prefix("0x").unwrap_or(&h)))
}

fn point_args(call: &EntryCall, x: usize, y: usize) -> Result<CurvePoint, Abort> {
    CurvePoint::from_le_hex(&bytes_arg(call, x)?, &bytes_arg(call, y)?).map_err(|_| Abort::BadPoint)
}

impl MemoryLedger {
    /// Fresh ledger with `package` published; `address` is the first signer.
    pub fn new(package: &str, address: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            address: padded_address(address).unwrap_or_else(|_| address.to_string()),
            verifier: Verifier::new(package),
        }
    }

    /// Another signer on the same ledger.
    pub fn signer(&self, address: &str) -> Self {
        Self {
            state: Arc::clone(&self.state),
            address: padded_address(address).unwrap_or_else(|_| address.to_string()),
            verifier: self.verifier.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // a panicking test thread leaves the state usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Committed transactions so far, across all signers.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    /// Makes the next submission abort with `vm_status` without touching state.
    pub fn fail_next_submit(&self, vm_status: &str) {
        self.lock().fail_next = Some(vm_status.to_string());
    }

    pub fn registry_snapshot(&self) -> GameRegistry {
        self.lock().registry.clone()
    }

    // ── Entry functions ─────────────────────────────────────

    fn create_game(&self, s: &mut State) -> Result<Vec<Event>, Abort> {
        if s.registry_owner.is_none() {
            s.registry_owner = Some(self.address.clone());
        }
        let answers = s.fresh_handle();
        let profiles = s.fresh_handle();
        s.registry.games.push(GameEntry {
            answers: TableRef { handle: answers },
            profiles: TableRef { handle: profiles },
            questions: Vec::new(),
        });
        Ok(vec![Event {
            type_tag: self.verifier.game_created_event(),
            data: json!({ "game_number_in_registry": s.registry.games.len().to_string() }),
        }])
    }

    fn create_quest(&self, s: &mut State, call: &EntryCall) -> Result<Vec<Event>, Abort> {
        let game = u64_arg(call, 0)? as usize;
        let question = text_arg(call, 3)?;
        point_args(call, 8, 9)?;
        let entry = QuestionEntry {
            question,
            kp_x: bytes_arg(call, 8)?,
            kp_y: bytes_arg(call, 9)?,
        };
        let g = s.registry.games.get_mut(game).ok_or(Abort::GameNotFound)?;
        g.questions.push(entry);
        Ok(Vec::new())
    }

    fn answer_question(&self, s: &mut State, call: &EntryCall) -> Result<Vec<Event>, Abort> {
        // 1. Locate the game and quest
        let game = u64_arg(call, 1)?;
        let quest = u64_arg(call, 2)?;
        let g = s.registry.games.get(game as usize).ok_or(Abort::GameNotFound)?;
        if quest as usize >= g.questions.len() {
            return Err(Abort::QuestNotFound);
        }
        let answers = g.answers.handle.clone();

        // 2. Validate the published points
        let blinded_x = bytes_arg(call, 7)?;
        let blinded_y = bytes_arg(call, 8)?;
        point_args(call, 7, 8)?;
        let reblinded = point_args(call, 12, 13)?;

        // 3. Record the answer for the oracle and remember the student's side
        s.write(
            &answers,
            Value::String(self.address.clone()),
            Some(json!({
                "student_address": self.address,
                "student_aH_x": blinded_x,
                "student_aH_y": blinded_y,
                "quest": quest.to_string(),
            })),
        );
        s.pending.insert((game, self.address.clone()), Pending { quest, reblinded });
        Ok(Vec::new())
    }

    fn score_answer(&self, s: &mut State, call: &EntryCall) -> Result<Vec<Event>, Abort> {
        // 1. Load the pending answer
        let quest = u64_arg(call, 0)?;
        let game = u64_arg(call, 1)?;
        let student = padded_address(&text_arg(call, 2)?).map_err(|_| Abort::BadArguments)?;
        let (answers, profiles) = {
            let g = s.registry.games.get(game as usize).ok_or(Abort::GameNotFound)?;
            (g.answers.handle.clone(), g.profiles.handle.clone())
        };
        let pending = s
            .pending
            .get(&(game, student.clone()))
            .cloned()
            .ok_or(Abort::NoPendingAnswer)?;
        if pending.quest != quest {
            return Err(Abort::QuestMismatch);
        }

        // 2. Matching rule
        let oracle_side = point_args(call, 6, 7)?;
        let correct = oracle_side == pending.reblinded;

        // 3. Update the profile
        let key = Value::String(student.clone());
        let mut profile: UserProfile = s
            .latest(&profiles, &key)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(|| UserProfile {
                level: MoveU64(1),
                ..UserProfile::default()
            });
        if correct {
            if !profile.answered_right.contains(&MoveU64(quest)) {
                profile.answered_right.push(MoveU64(quest));
            }
        } else {
            match profile.wrong_attempts.data.iter_mut().find(|e| e.key == MoveU64(quest)) {
                Some(e) => e.value = MoveU64(e.value.0 + 1),
                None => profile.wrong_attempts.data.push(SimpleMapEntry {
                    key: MoveU64(quest),
                    value: MoveU64(1),
                }),
            }
        }
        let profile = serde_json::to_value(&profile).map_err(|_| Abort::BadArguments)?;
        s.write(&profiles, key.clone(), Some(profile));

        // 4. Clear the answer
        s.write(&answers, key, None);
        s.pending.remove(&(game, student));
        Ok(Vec::new())
    }

    fn execute(&self, s: &mut State, call: &EntryCall) -> Result<Vec<Event>, Abort> {
        let prefix = format!("{}::verifier::", self.verifier.package());
        let name = call.function.strip_prefix(&prefix).ok_or(Abort::UnknownFunction)?;
        match name {
            "professor_create_game" => self.create_game(s),
            "professor_create_quest" => self.create_quest(s, call),
            "student_answer_question" => self.answer_question(s, call),
            "professor_score_answer" => self.score_answer(s, call),
            _ => Err(Abort::UnknownFunction),
        }
    }
}

impl Ledger for MemoryLedger {
    fn address(&self) -> &str {
        &self.address
    }

    async fn submit(&self, call: &EntryCall) -> Result<TxnOutcome, LedgerError> {
        let mut s = self.lock();
        s.txn_counter += 1;
        let hash = format!("0x{:064x}", s.txn_counter);

        if let Some(vm_status) = s.fail_next.take() {
            return Err(LedgerError::Rejected { hash, vm_status });
        }

        // an abort restores the pre-call state
        s.version += 1;
        let snapshot = (s.registry.clone(), s.tables.clone(), s.pending.clone(), s.registry_owner.clone());
        match self.execute(&mut s, call) {
            Ok(events) => {
                s.writes += 1;
                tracing::debug!(function = call.name(), version = s.version, "memory ledger committed");
                Ok(TxnOutcome {
                    hash,
                    version: s.version,
                    events,
                })
            }
            Err(code) => {
                (s.registry, s.tables, s.pending, s.registry_owner) = snapshot;
                Err(LedgerError::Rejected {
                    hash,
                    vm_status: format!("Move abort in {}: code {}", call.name(), code as u64),
                })
            }
        }
    }

    async fn resource(&self, owner: &str, resource_type: &str, _at_version: Option<u64>) -> Result<Value, LedgerError> {
        let s = self.lock();
        let owner = padded_address(owner).unwrap_or_else(|_| owner.to_string());
        if resource_type != self.verifier.registry_type() || s.registry_owner.as_deref() != Some(owner.as_str()) {
            return Err(LedgerError::NotFound(format!("{resource_type} at {owner}")));
        }
        serde_json::to_value(&s.registry).map_err(|e| LedgerError::Response(e.to_string()))
    }

    async fn table_item(
        &self,
        handle: &str,
        _key_type: &str,
        _value_type: &str,
        key: &Value,
    ) -> Result<Option<Value>, LedgerError> {
        let s = self.lock();
        let key = match key {
            Value::String(a) => Value::String(padded_address(a).unwrap_or_else(|_| a.clone())),
            other => other.clone(),
        };
        Ok(s.latest(handle, &key))
    }
}

impl Indexer for MemoryLedger {
    /// Full history; readers normalize with `latest_rows`.
    async fn table_rows(&self, handle: &str) -> Result<Vec<TableRow>, LedgerError> {
        let s = self.lock();
        Ok(s.tables.get(handle).cloned().unwrap_or_default())
    }
}
