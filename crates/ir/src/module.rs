//! Module representation: the WebAssembly MVP section set.
//!
//! Items referenced from expression code (functions, globals) live in two
//! index spaces the way the binary format defines them: imports first, then
//! definitions. `Call` targets index defined functions directly and
//! `CallImport` indexes the imported-function space; module-level references
//! (exports, the start function, element segments) keep the raw unified
//! index.

use crate::entities::{FuncIndex, GlobalIndex, SignatureIndex};
use crate::function::{Function, Signature};
use crate::types::{Literal, Type};
use cranelift_entity::PrimaryMap;

/// The type of a global variable.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct GlobalType {
    /// The value type.
    pub ty: Type,
    /// Whether the global can be written.
    pub mutable: bool,
}

/// A constant initializer for a global or a segment offset.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum InitExpr {
    /// A literal constant.
    Const(Literal),
    /// The value of an imported global.
    GlobalGet(GlobalIndex),
}

/// A global variable defined in the module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Global {
    /// Its type and mutability.
    pub ty: GlobalType,
    /// Its initial value.
    pub init: InitExpr,
}

/// Size limits shared by tables and memories.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Limits {
    /// Initial size.
    pub min: u32,
    /// Optional maximum size.
    pub max: Option<u32>,
}

/// A function table (MVP: always `funcref`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Table {
    /// Element count limits.
    pub limits: Limits,
}

/// A linear memory.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Memory {
    /// Page count limits.
    pub limits: Limits,
}

/// What an import provides.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ImportKind {
    /// A function with the given signature.
    Func(SignatureIndex),
    /// A table.
    Table(Table),
    /// A linear memory.
    Memory(Memory),
    /// A global variable.
    Global(GlobalType),
}

/// An import.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Import {
    /// The module namespace.
    pub module: String,
    /// The field name within the namespace.
    pub field: String,
    /// What is imported.
    pub kind: ImportKind,
}

/// The kind of item an export exposes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ExportKind {
    /// A function, by unified index.
    Func,
    /// A table.
    Table,
    /// A memory.
    Memory,
    /// A global.
    Global,
}

/// An export.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Export {
    /// The exported name.
    pub name: String,
    /// The kind of item.
    pub kind: ExportKind,
    /// Unified index into the corresponding index space.
    pub index: u32,
}

/// An element segment populating the table with function references.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ElemSegment {
    /// The table being initialized (MVP: 0).
    pub table_index: u32,
    /// Where in the table the entries land.
    pub offset: InitExpr,
    /// Unified function indices.
    pub entries: Vec<u32>,
}

/// A data segment initializing linear memory.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DataSegment {
    /// The memory being initialized (MVP: 0).
    pub memory_index: u32,
    /// Where in memory the bytes land.
    pub offset: InitExpr,
    /// The bytes.
    pub data: Vec<u8>,
}

/// A WebAssembly module.
#[derive(Default)]
pub struct Module {
    /// The type section.
    pub signatures: PrimaryMap<SignatureIndex, Signature>,
    /// The import section, in declaration order.
    pub imports: Vec<Import>,
    /// Functions defined in this module.
    pub functions: PrimaryMap<FuncIndex, Function>,
    /// Tables defined in this module.
    pub tables: Vec<Table>,
    /// Memories defined in this module.
    pub memories: Vec<Memory>,
    /// Globals defined in this module.
    pub globals: Vec<Global>,
    /// The export section.
    pub exports: Vec<Export>,
    /// The start function, by unified index.
    pub start: Option<u32>,
    /// Element segments.
    pub elem_segments: Vec<ElemSegment>,
    /// Data segments.
    pub data_segments: Vec<DataSegment>,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of imported functions.
    pub fn num_imported_funcs(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| matches!(i.kind, ImportKind::Func(_)))
            .count() as u32
    }

    /// The signature of an imported function, by imported-function index.
    pub fn imported_func_sig(&self, import: u32) -> Option<SignatureIndex> {
        self.imports
            .iter()
            .filter_map(|i| match i.kind {
                ImportKind::Func(sig) => Some(sig),
                _ => None,
            })
            .nth(import as usize)
    }

    /// Resolve a unified function index to a defined function, or `None` if
    /// it names an import.
    pub fn defined_func(&self, unified: u32) -> Option<FuncIndex> {
        unified
            .checked_sub(self.num_imported_funcs())
            .map(FuncIndex::from_u32)
    }

    /// The type of a global, by unified index (imports first).
    pub fn global_ty(&self, global: GlobalIndex) -> Option<GlobalType> {
        let imported: Vec<GlobalType> = self
            .imports
            .iter()
            .filter_map(|i| match i.kind {
                ImportKind::Global(ty) => Some(ty),
                _ => None,
            })
            .collect();
        let index = global.as_u32() as usize;
        if index < imported.len() {
            Some(imported[index])
        } else {
            self.globals.get(index - imported.len()).map(|g| g.ty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_index_spaces() {
        let mut module = Module::new();
        let sig = module.signatures.push(Signature::default());
        module.imports.push(Import {
            module: "env".to_string(),
            field: "f".to_string(),
            kind: ImportKind::Func(sig),
        });
        module.imports.push(Import {
            module: "env".to_string(),
            field: "g".to_string(),
            kind: ImportKind::Global(GlobalType {
                ty: Type::I64,
                mutable: false,
            }),
        });
        module.globals.push(Global {
            ty: GlobalType {
                ty: Type::F32,
                mutable: true,
            },
            init: InitExpr::Const(Literal::F32(0f32.into())),
        });

        assert_eq!(module.num_imported_funcs(), 1);
        assert_eq!(module.imported_func_sig(0), Some(sig));
        assert_eq!(module.defined_func(0), None);
        assert_eq!(module.defined_func(1), Some(FuncIndex::from_u32(0)));
        assert_eq!(
            module.global_ty(GlobalIndex::from_u32(0)).map(|g| g.ty),
            Some(Type::I64)
        );
        assert_eq!(
            module.global_ty(GlobalIndex::from_u32(1)).map(|g| g.ty),
            Some(Type::F32)
        );
    }
}
