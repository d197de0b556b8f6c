use crate::mtac::basic_block::BasicBlock;
use crate::mtac::basic_block::BlockId;
use crate::mtac::basic_block::ENTRY_INDEX;
use crate::mtac::basic_block::EXIT_INDEX;
use crate::mtac::loops::Loop;
use crate::mtac::statement::Statement;
use crate::types::Type;
use crate::variables::FunctionContext;
use crate::variables::VariableId;

/// Declared parameter of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub param_type: Type,
    pub variable: VariableId,
}

/// A function owns its context (variables), its basic blocks and its
/// loops. Before basic-block extraction the body is the linear
/// `statements` stream; afterwards it lives in the blocks.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub parameters: Vec<Parameter>,
    pub context: FunctionContext,

    /// Linear statement stream produced by the front-end, consumed by
    /// basic-block extraction.
    pub statements: Vec<Statement>,

    blocks: Vec<BasicBlock>,
    /// Linear block order: ENTRY first, EXIT last.
    layout: Vec<BlockId>,
    pub entry: BlockId,
    pub exit: BlockId,
    next_index: i64,

    /// Natural loops, populated on demand.
    pub loops: Vec<Loop>,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: Type, context: FunctionContext) -> Function {
        let entry = BasicBlock::new(ENTRY_INDEX, ".entry".to_string());
        let exit = BasicBlock::new(EXIT_INDEX, ".exit".to_string());
        Function {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            context,
            statements: Vec::new(),
            blocks: vec![entry, exit],
            layout: vec![BlockId(0), BlockId(1)],
            entry: BlockId(0),
            exit: BlockId(1),
            next_index: 0,
            loops: Vec::new(),
        }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0]
    }

    /// Splits the borrow so a pass can rewrite a block while reading
    /// the variable store.
    pub fn block_with_context_mut(&mut self, id: BlockId) -> (&mut BasicBlock, &FunctionContext) {
        (&mut self.blocks[id.0], &self.context)
    }

    /// Creates a block in the slab without placing it in the layout.
    pub fn new_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len());
        let index = self.next_index;
        self.next_index += 1;
        self.blocks.push(BasicBlock::new(index, label.into()));
        id
    }

    pub fn new_block_auto_label(&mut self) -> BlockId {
        let label = format!(".L{}_{}", self.name, self.next_index);
        self.new_block(label)
    }

    /// Appends a block to the layout, before EXIT.
    pub fn append_block(&mut self, id: BlockId) {
        let position = self.layout.len() - 1;
        self.layout.insert(position, id);
    }

    /// Places `id` immediately before `before` in the layout.
    pub fn insert_block_before(&mut self, before: BlockId, id: BlockId) {
        let position = self
            .layout_position(before)
            .expect("insert before block not in layout");
        self.layout.insert(position, id);
    }

    pub fn remove_from_layout(&mut self, id: BlockId) {
        self.layout.retain(|&block| block != id);
    }

    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Number of slab slots, including blocks removed from the layout.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn layout_position(&self, id: BlockId) -> Option<usize> {
        self.layout.iter().position(|&block| block == id)
    }

    pub fn next_in_layout(&self, id: BlockId) -> Option<BlockId> {
        let position = self.layout_position(id)?;
        self.layout.get(position + 1).copied()
    }

    pub fn previous_in_layout(&self, id: BlockId) -> Option<BlockId> {
        let position = self.layout_position(id)?;
        position.checked_sub(1).map(|p| self.layout[p])
    }

    /// Blocks in linear order, sentinels included.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.layout.clone()
    }

    /// Non-sentinel blocks in linear order.
    pub fn real_block_ids(&self) -> Vec<BlockId> {
        self.layout
            .iter()
            .copied()
            .filter(|&id| !self.block(id).is_sentinel())
            .collect()
    }

    /// Resolves a label to the block carrying it.
    pub fn block_by_label(&self, label: &str) -> Option<BlockId> {
        self.layout
            .iter()
            .copied()
            .find(|&id| self.block(id).label == label)
    }

    /// All statements of all blocks in linear order, for tests and dumps.
    pub fn all_statements(&self) -> impl Iterator<Item = &Statement> {
        self.layout
            .iter()
            .flat_map(|&id| self.block(id).statements.iter())
    }

    pub fn sweep_nops(&mut self) -> bool {
        let mut changed = false;
        for id in self.block_ids() {
            changed |= self.block_mut(id).sweep_nops();
        }
        changed
    }
}
