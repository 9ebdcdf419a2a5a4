#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    RunId,
    PlanBatches,
    ScanBatches,
    Score,
    ParseResponse,
    ClassifyRun,
    Consolidate,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "run_id" => Command::RunId,
            "batches.plan" => Command::PlanBatches,
            "batches.scan" => Command::ScanBatches,
            "score" => Command::Score,
            "parse_response" => Command::ParseResponse,
            "classify.run" => Command::ClassifyRun,
            "classify.consolidate" => Command::Consolidate,
            _ => Command::Unknown,
        }
    }
}
