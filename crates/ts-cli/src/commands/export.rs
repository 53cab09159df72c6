use std::fmt::Write as _;
use std::path::Path;

use super::SessionArgs;

pub fn run(args: &SessionArgs, output: Option<&Path>) -> Result<(), String> {
    let mut session = args.start_session()?;
    session.run(args.ticks);

    let mut content = String::new();
    for event in session.events().events() {
        let line =
            serde_json::to_string(event).map_err(|e| format!("JSON serialization error: {e}"))?;
        let _ = writeln!(content, "{line}");
    }

    if let Some(path) = output {
        std::fs::write(path, &content)
            .map_err(|e| format!("cannot write to {}: {e}", path.display()))?;
        eprintln!(
            "  Exported {} events to {}",
            session.events().len(),
            path.display()
        );
    } else {
        print!("{content}");
    }

    Ok(())
}
