//! The `clozergx init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create clozergx.toml
    if std::path::Path::new("clozergx.toml").exists() {
        println!("clozergx.toml already exists, skipping.");
    } else {
        std::fs::write("clozergx.toml", SAMPLE_CONFIG)?;
        println!("Created clozergx.toml");
    }

    // Create example question and response
    std::fs::create_dir_all("questions")?;
    for (path, content) in [
        ("questions/example.txt", EXAMPLE_QUESTION),
        ("questions/example-response.json", EXAMPLE_RESPONSE),
    ] {
        if std::path::Path::new(path).exists() {
            println!("{path} already exists, skipping.");
        } else {
            std::fs::write(path, content)?;
            println!("Created {path}");
        }
    }

    println!("\nNext steps:");
    println!("  1. Run: clozergx validate --file questions/example.txt");
    println!("  2. Run: clozergx grade --file questions/example.txt --response questions/example-response.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# clozergx configuration

# Fraction deducted per try when computing a final grade.
penalty = 0.3333333

# Default interval for `clozergx gaps add`.
gap_interval = 5
skip_capitalized = false

# Longest question text accepted, in bytes.
max_text_len = 1048576
"#;

const EXAMPLE_QUESTION: &str = "\
<p>The capital of France is {1:SA:=Paris#Correct~*#Try again}.</p>
<p>It lies on the river {1:MC:Loire~=Seine~Rhone}, and its best-known tower \
is {1:NM:=330:5} metres tall.</p>
<p>Name a colour of the flag: {2:RX:=blue~=(white|red)~%50%bleu}.</p>
";

const EXAMPLE_RESPONSE: &str = r#"{
  "sub1_answer": "Paris",
  "sub2_answer": "1",
  "sub3_answer": "324",
  "sub4_answer": "bleu"
}
"#;
