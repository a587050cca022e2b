use tokio_util::sync::CancellationToken;

/// Cancellation context of one connection attempt
#[derive(Debug, Clone)]
pub struct AttemptScope {
    generation: u64,
    token: CancellationToken,
}

impl AttemptScope {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Holds at most one live `AttemptScope`.
#[derive(Debug, Default)]
pub struct ScopeSlot {
    current: Option<AttemptScope>,
    last_generation: u64,
}

impl ScopeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the live scope (if any) and install a fresh one.
    pub fn renew(&mut self) -> AttemptScope {
        self.cancel();
        self.last_generation += 1;

        let scope = AttemptScope {
            generation: self.last_generation,
            token: CancellationToken::new(),
        };
        self.current = Some(scope.clone());
        scope
    }

    pub fn cancel(&mut self) {
        if let Some(scope) = self.current.take() {
            scope.token.cancel();
        }
    }

    pub fn current(&self) -> Option<&AttemptScope> {
        self.current.as_ref()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|scope| scope.generation == generation && !scope.is_cancelled())
    }

    /// Token for work nested under the live scope.
    ///
    /// Without a live scope the token is born cancelled.
    pub fn child_token(&self) -> CancellationToken {
        match &self.current {
            Some(scope) => scope.token.child_token(),
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        }
    }
}
