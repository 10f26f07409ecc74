//! Mock and fake transports

use datalog_rs::backend::{RegisterRequest, RegisterTransport};
use datalog_rs::error::{DataLogError, Result};
use mockall::mock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub Transport {}

    impl RegisterTransport for Transport {
        fn read_registers(&mut self, request: &RegisterRequest) -> Result<Vec<u16>>;
        fn close(&mut self);
        fn is_open(&self) -> bool;
    }
}

/// Fake link returning a fixed register block, failing on chosen reads
///
/// Reads are numbered from 1 per transport.
#[derive(Debug)]
pub struct ScriptedTransport {
    registers: Vec<u16>,
    fail_on: HashSet<usize>,
    reads: usize,
    closes: Arc<AtomicUsize>,
    open: bool,
}

impl ScriptedTransport {
    pub fn new(registers: Vec<u16>) -> Self {
        Self {
            registers,
            fail_on: HashSet::new(),
            reads: 0,
            closes: Arc::new(AtomicUsize::new(0)),
            open: true,
        }
    }

    /// Fail the given read numbers with a timeout
    pub fn failing_on(mut self, reads: impl IntoIterator<Item = usize>) -> Self {
        self.fail_on = reads.into_iter().collect();
        self
    }

    /// Count closes into a shared counter
    pub fn counting_closes(mut self, closes: Arc<AtomicUsize>) -> Self {
        self.closes = closes;
        self
    }
}

impl RegisterTransport for ScriptedTransport {
    fn read_registers(&mut self, request: &RegisterRequest) -> Result<Vec<u16>> {
        self.reads += 1;
        if self.fail_on.contains(&self.reads) {
            return Err(DataLogError::Timeout(format!(
                "unit {} read {}",
                request.unit_address, self.reads
            )));
        }
        Ok(self.registers.clone())
    }

    fn close(&mut self) {
        self.open = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
