use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use inquire::{Confirm, CustomType, DateSelect, InquireError, Select, Text};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing_subscriber::EnvFilter;

use invoice_editor::codec::{self, TEMPLATE_EXTENSIONS};
use invoice_editor::dates;
use invoice_editor::render::{self, InvoiceView, PdfRenderer, RenderMode};
use invoice_editor::{FormState, Invoice, InvoiceField, LineItemField, Settings};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-editor", about = "Fill in, total and export invoices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default invoice as a new template
    New {
        /// Invoice number, used in the file name
        #[arg(long)]
        title: Option<String>,
    },
    /// Preview a template with its totals
    Show { file: PathBuf },
    /// Edit a template interactively (the working file when omitted)
    Edit { file: Option<PathBuf> },
    /// Validate a template and make it the working file
    Import { file: Option<PathBuf> },
    /// Export a template as PDF
    Pdf { file: PathBuf },
    /// Configure the output directory
    Config,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return;
    };

    if let Err(e) = run(command) {
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    let mut settings = Settings::load().context("failed to load settings")?;
    let today = Local::now().date_naive();

    match command {
        Commands::New { title } => {
            let mut invoice = Invoice::default();
            if let Some(title) = title {
                invoice = invoice.with_field(InvoiceField::InvoiceTitle, title);
            }
            let path = save_template(&mut settings, &invoice)?;
            println!("✅ Template created: {}", path.display());
        }
        Commands::Show { file } => {
            let invoice = codec::read_template(&file)?;
            print_preview(&invoice, today);
        }
        Commands::Edit { file } => {
            let start = match file.or_else(|| settings.working_file.clone()) {
                Some(path) => codec::read_template(&path)?,
                None => Invoice::default(),
            };
            edit_wizard(&mut settings, FormState::new(start), today)?;
        }
        Commands::Import { file } => {
            let Some(path) = file.or_else(pick_template_file) else {
                println!("❌ No file selected.");
                return Ok(());
            };
            // the working file only changes once the template validates
            let invoice = codec::read_template(&path)?;
            tracing::info!(path = %path.display(), "template parsed correctly");
            settings.working_file = Some(path.clone());
            settings.save()?;
            println!("✅ Imported {}", path.display());
            print_preview(&invoice, today);
        }
        Commands::Pdf { file } => {
            let invoice = codec::read_template(&file)?;
            let out_dir = settings.ensure_output_dir()?;
            let renderer = PdfRenderer::new(&settings.typst, Some(&out_dir.join("templates")))?;
            println!("\n🔨 Compiling PDF...");
            let pdf_path = renderer.export(&invoice, &out_dir, today)?;
            println!("✅ PDF Generated: {}", pdf_path.display());
            open_and_reveal(&pdf_path);
        }
        Commands::Config => {
            setup_config_wizard(&mut settings)?;
        }
    }
    Ok(())
}

// ==========================================
// Editing
// ==========================================

#[derive(Clone, Copy)]
enum Action {
    EditField,
    EditLine,
    AddLine,
    RemoveLine,
    DueIn30Days,
    LogoWidth,
    Import,
    Preview,
    Save,
    Quit,
}

impl Action {
    const ALL: [Action; 10] = [
        Action::EditField,
        Action::EditLine,
        Action::AddLine,
        Action::RemoveLine,
        Action::DueIn30Days,
        Action::LogoWidth,
        Action::Import,
        Action::Preview,
        Action::Save,
        Action::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::EditField => "✏️  Edit a field",
            Action::EditLine => "✏️  Edit a line item",
            Action::AddLine => "➕ Add line item",
            Action::RemoveLine => "➖ Remove line item",
            Action::DueIn30Days => "📅 Due date +30 days",
            Action::LogoWidth => "🖼  Logo width",
            Action::Import => "📂 Import template",
            Action::Preview => "👀 Preview",
            Action::Save => "💾 Save template",
            Action::Quit => "🚪 Quit",
        };
        f.write_str(label)
    }
}

fn is_cancel(err: &InquireError) -> bool {
    matches!(
        err,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

/// Runs a prompt, mapping Esc/Ctrl-C to `None`.
fn ask<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_cancel(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn edit_wizard(settings: &mut Settings, mut form: FormState, today: NaiveDate) -> Result<()> {
    let mut saved_revision = form.revision();
    print_preview(form.invoice(), today);

    loop {
        let Some(action) = ask(Select::new("What next?", Action::ALL.to_vec()).prompt())? else {
            break;
        };

        match action {
            Action::EditField => edit_field(&mut form, today)?,
            Action::EditLine => edit_line(&mut form)?,
            Action::AddLine => {
                form.add_line_item();
                println!("✅ Line {} added.", form.invoice().product_lines.len());
            }
            Action::RemoveLine => {
                if let Some(index) = pick_line(&form, "Remove which line?")? {
                    form.remove_line_item(index)?;
                    println!("✅ Line {} removed.", index + 1);
                }
            }
            Action::DueIn30Days => {
                form.set_due_in_30_days(today);
                println!("✅ Due date: {}", form.invoice().invoice_due_date);
            }
            Action::LogoWidth => {
                let current = form.invoice().logo_width;
                if let Some(width) = ask(
                    CustomType::<f64>::new("Logo width:")
                        .with_default(current)
                        .prompt(),
                )? {
                    if let Err(e) = form.set_logo_width(width) {
                        println!("❌ {e}");
                    }
                }
            }
            Action::Import => {
                if let Some(path) = pick_template_file() {
                    match fs::read(&path) {
                        Ok(bytes) => match form.import(&bytes) {
                            Ok(()) => println!("✅ Imported {}", path.display()),
                            Err(e) => println!("❌ {e}. Keeping the current invoice."),
                        },
                        Err(e) => println!("❌ Failed to read {}: {e}", path.display()),
                    }
                }
            }
            Action::Preview => print_preview(form.invoice(), today),
            Action::Save => {
                let path = save_template(settings, form.invoice())?;
                saved_revision = form.revision();
                println!("✅ Saved: {}", path.display());
            }
            Action::Quit => break,
        }
    }

    if form.revision() != saved_revision
        && Confirm::new("Save changes before leaving?")
            .with_default(true)
            .prompt()
            .unwrap_or(false)
    {
        let path = save_template(settings, form.invoice())?;
        println!("✅ Saved: {}", path.display());
    }
    Ok(())
}

fn edit_field(form: &mut FormState, today: NaiveDate) -> Result<()> {
    let Some(field) = ask(
        Select::new("Field (Type to Filter):", InvoiceField::ALL.to_vec())
            .with_page_size(12)
            .prompt(),
    )?
    else {
        return Ok(());
    };

    let value = match field {
        InvoiceField::InvoiceDate | InvoiceField::InvoiceDueDate => {
            let current = if field == InvoiceField::InvoiceDate {
                dates::issue_date(form.invoice(), today)
            } else {
                dates::due_date(form.invoice(), today)
            };
            ask(
                DateSelect::new(&format!("{field}:"))
                    .with_default(current)
                    .prompt(),
            )?
            .map(dates::format_date)
        }
        _ => ask(
            Text::new(&format!("{field}:"))
                .with_initial_value(field.get(form.invoice()))
                .prompt(),
        )?,
    };

    if let Some(value) = value {
        form.edit_field(field, value);
    }
    Ok(())
}

fn pick_line(form: &FormState, prompt: &str) -> Result<Option<usize>> {
    let lines = &form.invoice().product_lines;
    if lines.is_empty() {
        println!("(No line items)");
        return Ok(None);
    }
    let options: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let name = if line.name.is_empty() { "(unnamed)" } else { &line.name };
            format!("{}. {} | {} × {}", i + 1, name, line.quantity, line.rate)
        })
        .collect();
    Ok(ask(Select::new(prompt, options).raw_prompt())?.map(|choice| choice.index))
}

fn edit_line(form: &mut FormState) -> Result<()> {
    let Some(index) = pick_line(form, "Edit which line?")? else {
        return Ok(());
    };
    let Some(field) = ask(Select::new("Column:", LineItemField::ALL.to_vec()).prompt())? else {
        return Ok(());
    };
    let current = field.get(&form.invoice().product_lines[index]).to_string();
    if let Some(value) = ask(
        Text::new(&format!("{field}:"))
            .with_initial_value(&current)
            .prompt(),
    )? {
        form.edit_line_item(index, field, &value)?;
    }
    Ok(())
}

// ==========================================
// Output
// ==========================================

fn print_preview(invoice: &Invoice, today: NaiveDate) {
    let view = InvoiceView::build(invoice, RenderMode::Screen, today);
    let inv = &view.invoice;
    println!("\n--- {} ---", inv.title);
    println!("{} | {}", inv.company_name, inv.company_address);
    println!("{} {}", inv.invoice_title_label, inv.invoice_title);
    println!("{}: {}", inv.invoice_date_label, view.issue_date);
    println!("{}: {}", inv.invoice_due_date_label, view.due_date);
    println!("{} {} | {}", inv.issued_to_label, inv.client_name, inv.client_address1);
    println!("{}", render::preview_table(&view));
}

fn save_template(settings: &mut Settings, invoice: &Invoice) -> Result<PathBuf> {
    let dir = settings.ensure_output_dir()?;
    let path = codec::write_template(invoice, &dir)?;
    settings.working_file = Some(path.clone());
    settings.save()?;
    Ok(path)
}

fn pick_template_file() -> Option<PathBuf> {
    println!("📂 Opening file picker...");
    rfd::FileDialog::new()
        .set_title("Upload Template File")
        .add_filter("Invoice template", TEMPLATE_EXTENSIONS)
        .pick_file()
}

// ==========================================
// Config & Utilities
// ==========================================

fn setup_config_wizard(settings: &mut Settings) -> Result<()> {
    println!("\n⚙️  --- Configuration Setup ---");

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Output Directory")
        .pick_folder();

    settings.output_dir = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            Text::new("Enter Output Directory:")
                .with_default(&settings.output_dir)
                .prompt()?
        }
    };

    settings.save()?;
    println!("✅ Settings saved to {}", Settings::config_path().display());
    Ok(())
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
