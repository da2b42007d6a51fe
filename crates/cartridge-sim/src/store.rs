//! Variable storage for the simulator.

use std::collections::BTreeMap;

use cartridge_types::{IntType, Storage, Value, Variable};

use crate::error::{SimError, SimResult};

/// One variable's cells. Scalars have exactly one element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    ty: IntType,
    storage: Storage,
    values: Vec<Value>,
}

/// All user globals, keyed by name.
///
/// Every write converts to the variable's declared type, so stored values
/// are always in range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    cells: BTreeMap<String, Cell>,
}

impl VariableStore {
    /// Create the store with each variable at its initial value.
    pub fn new(variables: &[Variable]) -> Self {
        let cells = variables
            .iter()
            .map(|v| {
                let values = v.initial.iter().map(|x| x.cast(v.ty)).collect();
                (
                    v.name.clone(),
                    Cell {
                        ty: v.ty,
                        storage: v.storage,
                        values,
                    },
                )
            })
            .collect();
        Self { cells }
    }

    fn cell(&self, name: &str) -> SimResult<&Cell> {
        self.cells
            .get(name)
            .ok_or_else(|| SimError::unresolved("variable", name))
    }

    fn cell_mut(&mut self, name: &str) -> SimResult<&mut Cell> {
        self.cells
            .get_mut(name)
            .ok_or_else(|| SimError::unresolved("variable", name))
    }

    /// Read a scalar.
    pub fn get(&self, name: &str) -> SimResult<Value> {
        let cell = self.cell(name)?;
        match (cell.storage, cell.values.first()) {
            (Storage::Scalar, Some(v)) => Ok(*v),
            _ => Err(SimError::TypeMismatch(format!("'{name}' is not a scalar"))),
        }
    }

    /// Write a scalar, converting to its type.
    pub fn set(&mut self, name: &str, value: Value) -> SimResult<()> {
        let cell = self.cell_mut(name)?;
        match (cell.storage, cell.values.first_mut()) {
            (Storage::Scalar, Some(slot)) => {
                *slot = value.cast(cell.ty);
                Ok(())
            }
            _ => Err(SimError::TypeMismatch(format!("'{name}' is not a scalar"))),
        }
    }

    /// Element position for a raw index: the index as `u16`, modulo the
    /// array length.
    fn position(cell: &Cell, name: &str, index: Value) -> SimResult<usize> {
        match cell.storage {
            Storage::Array(len) if len > 0 => Ok(index.cast(IntType::U16).raw as usize % len as usize),
            _ => Err(SimError::TypeMismatch(format!("'{name}' is not an array"))),
        }
    }

    pub fn get_index(&self, name: &str, index: Value) -> SimResult<Value> {
        let cell = self.cell(name)?;
        let at = Self::position(cell, name, index)?;
        Ok(cell.values[at])
    }

    pub fn set_index(&mut self, name: &str, index: Value, value: Value) -> SimResult<()> {
        let cell = self.cell_mut(name)?;
        let at = Self::position(cell, name, index)?;
        cell.values[at] = value.cast(cell.ty);
        Ok(())
    }

    /// Every element of a variable (one for scalars).
    pub fn elements(&self, name: &str) -> Option<&[Value]> {
        self.cells.get(name).map(|c| c.values.as_slice())
    }

    /// Replace every element, converting each to the declared type. Used
    /// when loading save data.
    pub fn replace(&mut self, name: &str, values: &[Value]) -> SimResult<()> {
        let cell = self.cell_mut(name)?;
        if values.len() != cell.values.len() {
            return Err(SimError::TypeMismatch(format!(
                "'{name}' has {} elements, got {}",
                cell.values.len(),
                values.len()
            )));
        }
        for (slot, value) in cell.values.iter_mut().zip(values) {
            *slot = value.cast(cell.ty);
        }
        Ok(())
    }

    /// All variables in name order.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Value>> {
        self.cells
            .iter()
            .map(|(name, cell)| (name.clone(), cell.values.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VariableStore {
        VariableStore::new(&[
            Variable {
                name: "score".into(),
                ty: IntType::U8,
                storage: Storage::Scalar,
                initial: vec![Value::u8(250)],
            },
            Variable {
                name: "hp".into(),
                ty: IntType::I8,
                storage: Storage::Array(3),
                initial: vec![Value::i8(0); 3],
            },
        ])
    }

    #[test]
    fn scalar_writes_wrap_to_type() {
        let mut s = store();
        s.set("score", Value::u16(300)).unwrap();
        assert_eq!(s.get("score").unwrap(), Value::u8(44));
    }

    #[test]
    fn array_indices_wrap_modulo_length() {
        let mut s = store();
        s.set_index("hp", Value::u8(4), Value::i8(-7)).unwrap();
        assert_eq!(s.get_index("hp", Value::u8(1)).unwrap(), Value::i8(-7));
        // -1 as u16 is 65535, and 65535 % 3 == 0.
        s.set_index("hp", Value::i8(-1), Value::i8(9)).unwrap();
        assert_eq!(s.elements("hp").unwrap()[0], Value::i8(9));
    }

    #[test]
    fn shape_mismatches_are_errors() {
        let s = store();
        assert!(matches!(s.get("hp"), Err(SimError::TypeMismatch(_))));
        assert!(matches!(
            s.get("lives"),
            Err(SimError::UnresolvedSymbol { kind: "variable", .. })
        ));
    }
}
