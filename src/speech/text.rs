//! Text clean-up before synthesis
//!
//! Coaching lines contain punch numbers ("1-2-3"), round clocks ("3:00") and
//! symbols that speech engines read badly.

/// Normalize a coaching line for speech output
pub fn normalize_for_speech(text: &str) -> String {
    let mut result = text.to_string();

    let abbreviations = [
        ("vs.", "versus"),
        ("e.g.", "for example"),
        ("approx.", "approximately"),
        ("secs.", "seconds"),
        ("mins.", "minutes"),
        ("sec.", "seconds"),
        ("min.", "minutes"),
    ];
    for (short, long) in abbreviations {
        result = result.replace(short, long);
    }

    result = result.replace('&', " and ");
    result = result.replace('%', " percent");
    result = result.replace('+', " plus ");

    result = expand_numbers(&result);

    // Keep letters, digits and the punctuation engines pause on
    let kept: String = result
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'-\"".contains(*c))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Expand punch combos ("1-2-3") and round clocks ("2:30") into words
fn expand_numbers(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            result.push(c);
            continue;
        }

        let mut first = String::from(c);
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() {
                first.push(next);
                chars.next();
            } else {
                break;
            }
        }

        match chars.peek() {
            Some(&':') => {
                chars.next();
                let mut seconds = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_digit() && seconds.len() < 2 {
                        seconds.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if seconds.is_empty() {
                    result.push_str(&first);
                    result.push(':');
                } else {
                    result.push_str(&clock_to_words(&first, &seconds));
                }
            }
            Some(&'-') => {
                // Punch combination: single digits joined by dashes
                let mut combo = vec![first];
                while let Some(&'-') = chars.peek() {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            chars.next();
                            let mut num = String::new();
                            while let Some(&next) = chars.peek() {
                                if next.is_ascii_digit() {
                                    num.push(next);
                                    chars.next();
                                } else {
                                    break;
                                }
                            }
                            combo.push(num);
                        }
                        _ => break,
                    }
                }
                let words: Vec<String> = combo.iter().map(|n| number_to_words(n)).collect();
                result.push_str(&words.join(", "));
            }
            _ => result.push_str(&first),
        }
    }

    result
}

fn clock_to_words(minutes: &str, seconds: &str) -> String {
    let mins: u32 = minutes.parse().unwrap_or(0);
    let secs: u32 = seconds.parse().unwrap_or(0);

    let minute_part = match mins {
        0 => String::new(),
        1 => "one minute".to_string(),
        n => format!("{} minutes", number_to_words(&n.to_string())),
    };
    let second_part = match secs {
        0 => String::new(),
        n => format!("{} seconds", number_to_words(&n.to_string())),
    };

    match (minute_part.is_empty(), second_part.is_empty()) {
        (false, false) => format!("{} {}", minute_part, second_part),
        (false, true) => minute_part,
        (true, false) => second_part,
        (true, true) => "zero seconds".to_string(),
    }
}

const UNITS: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const DECADES: [&str; 8] = [
    "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Spell out 0..=99; anything else is returned as digits
fn number_to_words(digits: &str) -> String {
    let Ok(value) = digits.parse::<usize>() else {
        return digits.to_string();
    };
    match (value / 10, value % 10) {
        _ if value < 20 => UNITS[value].to_string(),
        (tens @ 2..=9, 0) => DECADES[tens - 2].to_string(),
        (tens @ 2..=9, unit) => format!("{}-{}", DECADES[tens - 2], UNITS[unit]),
        _ => digits.to_string(),
    }
}
