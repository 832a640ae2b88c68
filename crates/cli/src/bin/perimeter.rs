use anyhow::Result;

fn main() -> Result<()> {
    perimeter_cli::main_entry()
}
