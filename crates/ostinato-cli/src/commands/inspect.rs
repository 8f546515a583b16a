use anyhow::Result;
use ostinato_core::MidiIntrospector;
use ostinato_etl::MidiFileIntrospector;
use std::path::Path;

pub fn run_inspect(path: &Path, json: bool) -> Result<()> {
    let info = MidiFileIntrospector::new().inspect(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", path.display());
    println!("  Duration: {:.2} s", info.duration_secs);
    println!("  Tempo: {:.1} BPM", info.tempo_bpm);
    if info.instruments.is_empty() {
        println!("  Instruments: none");
    } else {
        println!("  Instruments: {}", info.instruments.join(", "));
    }
    println!("  Drums: {}", if info.has_drums { "yes" } else { "no" });

    Ok(())
}
