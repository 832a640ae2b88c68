use crate::render;
use crate::session::Session;
use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use perimeter_formulas::{Figure, Parameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Compute(Figure),
    ShowHistory,
    Search,
    Statistics,
    Clear,
    Exit,
}

fn actions() -> Vec<(Action, String)> {
    let mut out: Vec<(Action, String)> = Figure::ALL
        .iter()
        .map(|f| (Action::Compute(*f), f.label().to_string()))
        .collect();
    out.extend([
        (Action::ShowHistory, "Show history".to_string()),
        (Action::Search, "Search history by figure".to_string()),
        (Action::Statistics, "Statistics".to_string()),
        (Action::Clear, "Clear history".to_string()),
        (Action::Exit, "Exit".to_string()),
    ]);
    out
}

fn prompt_for(param: &str) -> &'static str {
    match param {
        "lado" => "Side",
        "base" => "Base",
        "altura" => "Height",
        "base_mayor" => "Major base",
        "base_menor" => "Minor base",
        "radio" => "Radius",
        "num_lados" => "Number of sides",
        "lados_iguales" => "Equal sides",
        "lado_1" => "First side",
        "lado_2" => "Second side",
        "lado_3" => "Third side",
        "cateto_1" => "First leg",
        "cateto_2" => "Second leg",
        _ => "Value",
    }
}

fn ask_positive(theme: &ColorfulTheme, prompt: &str) -> Result<f64> {
    let value = Input::<f64>::with_theme(theme)
        .with_prompt(prompt)
        .validate_with(|v: &f64| -> Result<(), &str> {
            if v.is_finite() && *v > 0.0 {
                Ok(())
            } else {
                Err("Enter a number greater than zero")
            }
        })
        .interact_text()?;
    Ok(value)
}

/// Interactive loop. Formula and storage errors are reported and the loop goes on;
/// only terminal I/O failures end it.
pub fn run(session: &Session) -> Result<()> {
    let theme = ColorfulTheme::default();
    let actions = actions();
    let labels: Vec<&str> = actions.iter().map(|(_, label)| label.as_str()).collect();

    loop {
        let choice = Select::with_theme(&theme)
            .with_prompt("Perimeter menu")
            .items(&labels)
            .default(0)
            .interact()?;

        match actions[choice].0 {
            Action::Compute(figure) => compute(session, &theme, figure)?,
            Action::ShowHistory => {
                let listing = session.list(None);
                render::print_load_warning(listing.warning.as_ref());
                render::print_records(&listing.value);
            }
            Action::Search => {
                let figures: Vec<&str> = Figure::ALL.iter().map(|f| f.as_str()).collect();
                let idx = Select::with_theme(&theme)
                    .with_prompt("Figure to search")
                    .items(&figures)
                    .default(0)
                    .interact()?;
                let found = session.search(figures[idx]);
                render::print_load_warning(found.warning.as_ref());
                render::print_records(&found.value);
            }
            Action::Statistics => {
                let stats = session.stats();
                render::print_load_warning(stats.warning.as_ref());
                render::print_stats(&stats.value);
            }
            Action::Clear => {
                let confirmed = Confirm::with_theme(&theme)
                    .with_prompt("Delete the whole history?")
                    .default(false)
                    .interact()?;
                if confirmed {
                    match session.clear() {
                        Ok(true) => println!("History cleared."),
                        Ok(false) => println!("There was no history to clear."),
                        Err(err) => eprintln!("{} {err}", style("error:").red().bold()),
                    }
                }
            }
            Action::Exit => {
                println!("{}", style("Bye!").bold());
                return Ok(());
            }
        }
        println!();
    }
}

fn compute(session: &Session, theme: &ColorfulTheme, figure: Figure) -> Result<()> {
    let mut params = Parameters::new();
    for name in figure.parameter_names() {
        params.insert((*name).to_string(), ask_positive(theme, prompt_for(name))?);
    }
    match session.calculate(figure.as_str(), params) {
        Ok(outcome) => render::print_outcome(&outcome),
        Err(err) => eprintln!("{} {err}", style("error:").red().bold()),
    }
    Ok(())
}
