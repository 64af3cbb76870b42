//! Wire format for traced cases.
//!
//! A case is a JSON object with a `data` array of operand records and a
//! `code` array of task records. Operand records keep any extra fields
//! they carry; task records keep their `attr` payload. Times are
//! microseconds on the wire and nanoseconds in memory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::arena::{Arena, Handle};
use crate::error::LoadError;
use crate::operand::Operand;
use crate::schedule::{Common, Schedule};
use crate::task::Task;

#[derive(Debug, Serialize, Deserialize)]
struct OperandRecord {
    id: u64,
    size: u64,
    #[serde(flatten)]
    attrs: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskRecord {
    name: String,
    ins: Vec<u64>,
    outs: Vec<u64>,
    #[serde(default)]
    workspace: u64,
    /// Microseconds.
    #[serde(default)]
    time: f64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    attr: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct CaseFile {
    data: Vec<OperandRecord>,
    code: Vec<TaskRecord>,
}

/// Parses a case, validating operand references and operator names.
///
/// The returned schedule still contains `.dealloc` and `.share` markers;
/// canonicalization is a separate step.
pub fn read_case(text: &str) -> Result<(Arena<Operand>, Schedule), LoadError> {
    let file: CaseFile = serde_json::from_str(text)?;

    let mut operands = Arena::new();
    let mut by_id: HashMap<u64, Handle<Operand>> = HashMap::new();
    for record in file.data {
        if by_id.contains_key(&record.id) {
            return Err(LoadError::DuplicateOperand { id: record.id });
        }
        let handle = operands.append(Operand {
            id: record.id,
            size: record.size,
            attrs: record.attrs,
        });
        by_id.insert(record.id, handle);
    }

    let mut tasks = Vec::with_capacity(file.code.len());
    for (index, record) in file.code.into_iter().enumerate() {
        let resolve = |ids: &[u64]| -> Result<Vec<Handle<Operand>>, LoadError> {
            ids.iter()
                .map(|&id| {
                    by_id
                        .get(&id)
                        .copied()
                        .ok_or_else(|| LoadError::UnknownOperand {
                            name: record.name.clone(),
                            index,
                            id,
                        })
                })
                .collect()
        };
        let ins = resolve(&record.ins)?;
        let outs = resolve(&record.outs)?;
        let duration = (record.time * 1_000.0).round() as u64;
        let task = Task::new(
            index as u32,
            record.name,
            ins,
            outs,
            record.workspace,
            duration,
            record.attr,
            record.ins,
            record.outs,
        );
        if task.is_forbidden() {
            return Err(LoadError::ForbiddenTask {
                name: task.name,
                index,
            });
        }
        if task.is_dealloc() && !task.ins.is_empty() {
            return Err(LoadError::MalformedDealloc { index });
        }
        if task.is_share() && (task.ins.len() != 1 || task.outs.is_empty()) {
            return Err(LoadError::MalformedShare { index });
        }
        tasks.push(task);
    }

    Ok((operands, Schedule::new(tasks)))
}

/// Serializes a schedule back to the wire format.
///
/// Task slots are written with canonical operand ids; the emitted data
/// table covers exactly the operands the stream or the boundary sets
/// reference, in their original table order, with attributes intact.
pub fn write_case(common: &Common, schedule: &Schedule) -> Result<String, LoadError> {
    let mut referenced = vec![false; common.operands.len()];
    for task in &schedule.tasks {
        for &h in task.ins.iter().chain(task.outs.iter()) {
            referenced[h.index()] = true;
        }
    }
    for &h in common.already_on.iter().chain(common.not_dealloc.iter()) {
        referenced[h.index()] = true;
    }

    let data = common
        .operands
        .iter()
        .filter(|(h, _)| referenced[h.index()])
        .map(|(_, op)| OperandRecord {
            id: op.id,
            size: op.size,
            attrs: op.attrs.clone(),
        })
        .collect();

    let code = schedule
        .tasks
        .iter()
        .map(|task| TaskRecord {
            name: task.name.clone(),
            ins: task.ins.iter().map(|&h| common.operands[h].id).collect(),
            outs: task.outs.iter().map(|&h| common.operands[h].id).collect(),
            workspace: task.workspace,
            time: task.duration as f64 / 1_000.0,
            attr: task.attr.clone(),
        })
        .collect();

    Ok(serde_json::to_string(&CaseFile { data, code })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_case() -> String {
        json!({
            "data": [
                {"id": 0, "size": 1024, "dtype": "Float32"},
                {"id": 1, "size": 2048}
            ],
            "code": [
                {"name": "producer", "ins": [], "outs": [0], "workspace": 16, "time": 1.5},
                {"name": "consumer", "ins": [0], "outs": [1], "workspace": 0, "time": 2.0,
                 "attr": {"layer": 3}}
            ]
        })
        .to_string()
    }

    #[test]
    fn load_resolves_operands_and_times() {
        let (operands, schedule) = read_case(&minimal_case()).unwrap();
        assert_eq!(operands.len(), 2);
        assert_eq!(schedule.len(), 2);

        let producer = &schedule.tasks[0];
        assert_eq!(producer.id, 0);
        assert_eq!(producer.duration, 1_500);
        assert_eq!(producer.workspace, 16);
        assert_eq!(operands[producer.outs[0]].size, 1024);
        assert_eq!(operands[producer.outs[0]].attrs["dtype"], "Float32");

        let consumer = &schedule.tasks[1];
        assert_eq!(consumer.ins, producer.outs);
        assert_eq!(consumer.attr["layer"], 3);
    }

    #[test]
    fn forbidden_operator_rejected() {
        let text = json!({
            "data": [{"id": 0, "size": 8}],
            "code": [{"name": ".host2device", "ins": [], "outs": [0], "workspace": 0, "time": 0.0}]
        })
        .to_string();
        assert!(matches!(
            read_case(&text),
            Err(LoadError::ForbiddenTask { index: 0, .. })
        ));
    }

    #[test]
    fn unknown_operand_rejected() {
        let text = json!({
            "data": [{"id": 0, "size": 8}],
            "code": [{"name": "op", "ins": [5], "outs": [], "workspace": 0, "time": 0.0}]
        })
        .to_string();
        assert!(matches!(
            read_case(&text),
            Err(LoadError::UnknownOperand { id: 5, .. })
        ));
    }

    #[test]
    fn duplicate_operand_rejected() {
        let text = json!({
            "data": [{"id": 3, "size": 8}, {"id": 3, "size": 16}],
            "code": []
        })
        .to_string();
        assert!(matches!(
            read_case(&text),
            Err(LoadError::DuplicateOperand { id: 3 })
        ));
    }

    #[test]
    fn malformed_markers_rejected() {
        let dealloc = json!({
            "data": [{"id": 0, "size": 8}],
            "code": [{"name": ".dealloc", "ins": [0], "outs": [0], "workspace": 0, "time": 0.0}]
        })
        .to_string();
        assert!(matches!(
            read_case(&dealloc),
            Err(LoadError::MalformedDealloc { index: 0 })
        ));

        let share = json!({
            "data": [{"id": 0, "size": 8}],
            "code": [{"name": ".share", "ins": [0], "outs": [], "workspace": 0, "time": 0.0}]
        })
        .to_string();
        assert!(matches!(
            read_case(&share),
            Err(LoadError::MalformedShare { index: 0 })
        ));
    }

    #[test]
    fn write_then_read_preserves_structure() {
        let (operands, schedule) = read_case(&minimal_case()).unwrap();
        let mut common = Common {
            operands,
            ..Common::default()
        };
        common.not_dealloc.insert(schedule.tasks[1].outs[0]);

        let text = write_case(&common, &schedule).unwrap();
        let (operands2, schedule2) = read_case(&text).unwrap();

        assert_eq!(operands2.len(), 2);
        assert_eq!(schedule2.len(), schedule.len());
        for (a, b) in schedule.tasks.iter().zip(&schedule2.tasks) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.duration, b.duration);
            assert_eq!(a.workspace, b.workspace);
            assert_eq!(a.attr, b.attr);
        }
        assert_eq!(operands2[schedule2.tasks[1].outs[0]].size, 2048);
    }
}
