/*!
# Appraisal Session Engine

Commit-reveal appraisal sessions where stakers estimate the value of an
asset instance:
- Sealed commitments over `(appraisal, voter, secret)`, revealed after the deadline
- Sub-linear voting weight: `w = ⌊√(stake / lowest_stake)⌋`
- Final appraisal as the weight-averaged revealed value
- Accuracy scoring in bands of 1% around consensus
- Loss harvesting from voters outside 5%, redistributed by winner points
- Close-out sweep to the treasury with a 3% fee to whoever triggers it

## Lifecycle

```text
open_session → commit* → [deadline] → reveal* → set_final_appraisal
             → harvest* → claim* → (closed)
```

Each (asset, instance) can be reopened as a new attempt once the previous one
is closed, or three windows past its deadline.

## Module Structure

- **engine**: `SessionEngine` and every mutating operation
- **commitment**: Domain-separated BLAKE3 commitments
- **weighting**: Voting weight and weighted average
- **scoring**: Accuracy bands, harvest loss and commission tiers
- **guard**: Reentrancy guard held across each mutating call
- **config**: Engine configuration and protocol constants
- **events**: Session events delivered over an mpsc channel
- **error**: Engine errors

## Example

```rust
use appraisal_economics::Amount;
use appraisal_session::weighting::voting_weight;

// Sixteen times the lowest stake is worth four votes
let weight = voting_weight(Amount::from_whole_units(16), Amount::from_whole_units(1));
assert_eq!(weight, 4);
```
*/

pub mod clock;
pub mod commitment;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod scoring;
pub mod types;
pub mod weighting;

pub use clock::{Clock, ManualClock, SystemClock};
pub use commitment::Commitment;
pub use config::EngineConfig;
pub use engine::{HarvestOutcome, SessionEngine};
pub use error::{EngineError, Result};
pub use events::SessionEvent;
pub use scoring::{ScoringModel, StandardScoring};
pub use types::{
    AssetId, ClaimStatus, InstanceId, Session, SessionChecks, SessionCore, SessionKey,
    SessionProgression, Vote, VoterStatus,
};
