/// Line-oriented diagnostic output, written only while debug mode is on.
pub trait DebugSink {
    fn write_line(&mut self, line: &str);
}

/// Forwards debug lines into the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn write_line(&mut self, line: &str) {
        tracing::info!(target: "skyclock::debug", "{}", line);
    }
}

/// Prints debug lines to stdout, the way a serial console would show them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DebugSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }
}

impl DebugSink for Vec<String> {
    fn write_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}
