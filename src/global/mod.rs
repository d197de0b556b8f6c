pub mod config;
pub mod platform;

use crate::global::platform::Platform;
use crate::types::Type;
use indexmap::IndexMap;

/// A user-declared record type: named members laid out in declaration
/// order, no padding beyond the platform word granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub members: Vec<(String, Type)>,
}

impl Record {
    /// Byte offset of a member inside the record.
    pub fn member_offset(
        &self,
        member: &str,
        platform: &Platform,
        global: &GlobalContext,
    ) -> Option<usize> {
        let mut offset = 0;
        for (name, member_type) in &self.members {
            if name == member {
                return Some(offset);
            }
            offset += member_type.size(platform, global);
        }
        None
    }
}

/// Declared signature of a function, as the front-end registered it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: Type,
    pub parameters: Vec<(String, Type)>,
}

/// The process-wide symbol store: functions, records and global
/// variables. Built by the front-end, immutable once the middle-end
/// runs, except for function removal by inter-procedural cleanup.
#[derive(Debug, Clone, Default)]
pub struct GlobalContext {
    functions: IndexMap<String, FunctionSignature>,
    records: IndexMap<String, Record>,
    globals: IndexMap<String, Type>,
}

impl GlobalContext {
    pub fn add_function(&mut self, signature: FunctionSignature) {
        self.functions.insert(signature.name.clone(), signature);
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn remove_function(&mut self, name: &str) {
        self.functions.shift_remove(name);
    }

    pub fn add_record(&mut self, record: Record) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    pub fn record_size(&self, name: &str, platform: &Platform) -> usize {
        let Some(record) = self.records.get(name) else {
            return 0;
        };
        record
            .members
            .iter()
            .map(|(_, member_type)| member_type.size(platform, self))
            .sum()
    }

    pub fn add_global(&mut self, name: impl Into<String>, global_type: Type) {
        self.globals.insert(name.into(), global_type);
    }

    pub fn global(&self, name: &str) -> Option<&Type> {
        self.globals.get(name)
    }
}
