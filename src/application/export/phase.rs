use std::fmt;

/// Lifecycle of a single export request.
///
/// `collecting-catalog → fanning-out → barrier-wait → collecting-results →
/// archiving → done`, with `failed` reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportPhase {
    CollectingCatalog,
    FanningOut,
    BarrierWait,
    CollectingResults,
    Archiving,
    Done,
    Failed,
}

impl ExportPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportPhase::CollectingCatalog => "collecting-catalog",
            ExportPhase::FanningOut => "fanning-out",
            ExportPhase::BarrierWait => "barrier-wait",
            ExportPhase::CollectingResults => "collecting-results",
            ExportPhase::Archiving => "archiving",
            ExportPhase::Done => "done",
            ExportPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExportPhase::Done | ExportPhase::Failed)
    }

    pub fn can_advance_to(self, next: ExportPhase) -> bool {
        use ExportPhase::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }

        matches!(
            (self, next),
            (CollectingCatalog, FanningOut)
                | (FanningOut, BarrierWait)
                | (BarrierWait, CollectingResults)
                | (CollectingResults, Archiving)
                | (Archiving, Done)
        )
    }
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
