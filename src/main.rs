use std::sync::Arc;

use clap::Parser;
use quire::{
    ContentDir,
    ContentService,
    Document,
    Result,
    search::{SearchHit, SearchResult},
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("QUIRE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let content_dir = ContentDir::resolve(cli.content_dir.as_deref())?;
    let service = ContentService::open(content_dir.root())?;

    match cli.command {
        Command::List(args) => cmd_list(&service, &args)?,
        Command::Show(args) => cmd_show(&service, &args)?,
        Command::Search(args) => cmd_search(&service, &args)?,
        Command::Titles(args) => {
            let results = service.search_in_title(&args.query, args.count);
            print_results(&results, args.json)?;
        }
        Command::Suggest(args) => {
            let suggestions = service.suggestions(&args.query, args.count);
            if args.json {
                print_json(&suggestions)?;
            } else {
                for suggestion in suggestions {
                    println!("{suggestion}");
                }
            }
        }
        Command::Tags(args) => {
            let counts = service.tag_counts();
            if args.json {
                print_json(&counts)?;
            } else {
                for tag in counts {
                    println!("{:>4}  {}", tag.count, tag.name);
                }
            }
        }
        Command::Categories(args) => {
            let counts = service.category_counts();
            if args.json {
                print_json(&counts)?;
            } else {
                for category in counts {
                    println!("{:>4}  {}", category.count, category.name);
                }
            }
        }
        Command::Stats(args) => cmd_stats(&service, args.json)?,
        Command::Drafts(args) => {
            print_documents(&service.all_drafts(), args.json)?;
        }
        Command::Publish(args) => {
            let doc = service.publish(&args.slug)?;
            println!("Published '{}'", doc.slug);
        }
        Command::Unpublish(args) => {
            let doc = service.unpublish(&args.slug)?;
            println!("Moved '{}' back to drafts", doc.slug);
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_list(service: &ContentService, args: &cli::ListArgs) -> Result<()> {
    let mut docs = if let Some(tag) = &args.tag {
        service.by_tag(tag)
    } else if let Some(category) = &args.category {
        service.by_category(category)
    } else if args.featured {
        service.featured(0)
    } else {
        service.all()
    };
    if args.count > 0 {
        docs.truncate(args.count);
    }
    print_documents(&docs, args.json)
}

fn cmd_show(service: &ContentService, args: &cli::ShowArgs) -> Result<()> {
    let doc = if args.draft {
        service.preview_draft(&args.slug)?
    } else {
        service.get_by_slug(&args.slug)?
    };

    if args.json {
        #[derive(Serialize)]
        struct Full<'a> {
            #[serde(flatten)]
            summary: quire::DocumentSummary,
            author: &'a str,
            word_count: usize,
            body: &'a str,
            html: &'a str,
        }
        return print_json(&Full {
            summary: doc.summary(),
            author: &doc.author,
            word_count: doc.word_count,
            body: &doc.body,
            html: doc.rendered_body(),
        });
    }

    println!("{}", doc.title);
    println!("{}", "=".repeat(doc.title.chars().count()));
    println!(
        "{}  {} min read{}",
        doc.date.format("%Y-%m-%d"),
        doc.reading_time,
        if doc.draft { "  [draft]" } else { "" }
    );
    if !doc.tags.is_empty() {
        let tags: Vec<&str> = doc.tags.iter().map(|t| &**t).collect();
        println!("tags: {}", tags.join(", "));
    }
    println!();
    if args.html {
        print!("{}", doc.rendered_body());
    } else {
        println!("{}", doc.body);
    }
    Ok(())
}

fn cmd_search(service: &ContentService, args: &cli::SearchArgs) -> Result<()> {
    if let Some(page) = args.page {
        let page = service.search_paginated(&args.query, page, args.count);
        if args.json {
            #[derive(Serialize)]
            struct Page<'a> {
                query: &'a str,
                pagination: quire::search::Pagination,
                results: Vec<SearchHit>,
            }
            return print_json(&Page {
                query: &page.query,
                pagination: page.pagination,
                results: page.results.iter().map(SearchResult::hit).collect(),
            });
        }
        print_results(&page.results, false)?;
        println!(
            "page {} of {} ({} results)",
            page.pagination.current_page,
            page.pagination.total_pages,
            page.pagination.total_items
        );
        return Ok(());
    }

    let results = match args.filters() {
        Some(filters) => {
            let mut results =
                service.search_with_filters(&args.query, &filters);
            if args.limit() > 0 {
                results.truncate(args.limit());
            }
            results
        }
        None => service.search(&args.query, args.limit()),
    };
    print_results(&results, args.json)
}

fn cmd_stats(service: &ContentService, json: bool) -> Result<()> {
    let stats = service.stats();
    if json {
        return print_json(&stats);
    }

    println!("Documents: {} ({} drafts)", stats.published, stats.drafts);
    println!("Tags: {}", stats.tags);
    println!("Categories: {}", stats.categories);
    if let Some(loaded) = stats.last_loaded {
        println!("Loaded: {}", loaded.to_rfc3339());
    }
    if !stats.popular_tags.is_empty() {
        println!("Popular tags:");
        for tag in &stats.popular_tags {
            println!("  {:>4}  {}", tag.count, tag.name);
        }
    }
    if !stats.recent.is_empty() {
        println!("Recent:");
        for doc in &stats.recent {
            println!("  {}  {}", doc.date.format("%Y-%m-%d"), doc.title);
        }
    }
    Ok(())
}

fn print_documents(docs: &[Arc<Document>], json: bool) -> Result<()> {
    if json {
        let summaries: Vec<_> = docs.iter().map(|doc| doc.summary()).collect();
        return print_json(&summaries);
    }

    if docs.is_empty() {
        println!("No documents found.");
        return Ok(());
    }
    for doc in docs {
        println!(
            "{}  {:<30} {}",
            doc.date.format("%Y-%m-%d"),
            doc.slug,
            doc.title
        );
    }
    Ok(())
}

fn print_results(results: &[SearchResult], json: bool) -> Result<()> {
    if json {
        let hits: Vec<SearchHit> =
            results.iter().map(SearchResult::hit).collect();
        return print_json(&hits);
    }

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    for (rank, r) in results.iter().enumerate() {
        let fields: Vec<&str> =
            r.matched_fields.iter().map(|f| f.as_str()).collect();
        println!(
            "{:>3}. [{:.2}] {} ({})",
            rank + 1,
            r.score,
            r.document.title,
            fields.join(", ")
        );
        println!("     {}", r.document.excerpt());
    }
    println!("\n{} result(s)", results.len());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
