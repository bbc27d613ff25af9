use serde::Deserialize;

/// Resource usage reported by a node in `STATS` pushes
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub memory: MemoryStats,
    #[serde(default)]
    pub cpu: CpuStats,
    #[serde(default)]
    pub threads: ThreadStats,
    #[serde(default)]
    pub players: PlayerStats,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub heap_used: MemoryUsage,
    #[serde(default)]
    pub non_heap_used: MemoryUsage,
}

/// JVM memory pool counters, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemoryUsage {
    pub init: i64,
    pub max: i64,
    pub committed: i64,
    pub used: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub process_load: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThreadStats {
    pub running: u32,
    pub daemon: u32,
    pub peak: u32,
    pub total_started: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub active: u32,
    pub total: u32,
}
