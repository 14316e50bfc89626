//! Lexical properties of hotkey recognition, literals, and escapes.

use hotscript::dsl::token::BinaryOp;
use hotscript::dsl::{Compiler, ScriptError, Token, TokenKind};
use hotscript::hotkey::HotkeyPattern;
use pretty_assertions::assert_eq;

const MODIFIERS: [&str; 4] = ["Ctrl", "Alt", "Shift", "Win"];

fn lex(src: &str) -> Vec<Token> {
    Compiler::tokenize(src).expect("lex failed")
}

/// Token kinds without the trailing EndOfInput.
fn kinds(src: &str) -> Vec<TokenKind> {
    let mut kinds: Vec<TokenKind> = lex(src).into_iter().map(|t| t.kind).collect();
    assert_eq!(kinds.pop(), Some(TokenKind::EndOfInput));
    kinds
}

fn hotkey(text: &str) -> TokenKind {
    TokenKind::Hotkey(text.parse::<HotkeyPattern>().unwrap())
}

/// Every ordered selection of distinct modifiers, one or more long.
fn modifier_prefixes() -> Vec<String> {
    let mut out = Vec::new();
    for mask in 1u8..16 {
        let chosen: Vec<&str> = MODIFIERS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, m)| *m)
            .collect();
        out.push(chosen.join("+"));
        if chosen.len() > 1 {
            let mut reversed = chosen.clone();
            reversed.reverse();
            out.push(reversed.join("+"));
        }
    }
    out
}

#[test]
fn every_modifier_chord_is_one_token() {
    for prefix in modifier_prefixes() {
        for key in ["t", "Z", "9", "enter", "page_up", "F5"] {
            let text = format!("{prefix}+{key}");
            let tokens = lex(&text);
            assert_eq!(tokens.len(), 2, "{text}");
            assert_eq!(tokens[0].kind, hotkey(&text), "{text}");
            assert_eq!(tokens[0].raw, text);
            assert_eq!(tokens[0].column, 1);
        }
    }
}

#[test]
fn function_keys_one_through_twelve() {
    for n in 1..=12 {
        let text = format!("F{n}");
        assert_eq!(kinds(&text), vec![TokenKind::Hotkey(HotkeyPattern::Function(n))]);
    }
}

#[test]
fn invalid_function_keys_lex_as_if_never_attempted() {
    for text in ["F13", "F0", "F01", "F99"] {
        let tokens = lex(&format!("{text} => x"));
        assert_eq!(tokens[0].kind, TokenKind::Identifier, "{text}");
        assert_eq!(tokens[0].value, text);
        assert_eq!(tokens[1].kind, TokenKind::Arrow);
        assert_eq!(tokens[1].column, text.len() + 2);
    }
}

#[test]
fn failed_chord_backtracks_exactly() {
    let tokens = lex("Ctrl+Foo+x - Alt");
    let summary: Vec<(TokenKind, String, usize)> = tokens
        .iter()
        .map(|t| (t.kind.clone(), t.value.clone(), t.column))
        .collect();
    assert_eq!(
        summary,
        vec![
            (TokenKind::Identifier, "Ctrl".to_string(), 1),
            (TokenKind::BinaryOp(BinaryOp::Add), "+".to_string(), 5),
            (TokenKind::Identifier, "Foo".to_string(), 6),
            (TokenKind::BinaryOp(BinaryOp::Add), "+".to_string(), 9),
            (TokenKind::Identifier, "x".to_string(), 10),
            (TokenKind::BinaryOp(BinaryOp::Sub), "-".to_string(), 12),
            (TokenKind::Identifier, "Alt".to_string(), 14),
            (TokenKind::EndOfInput, String::new(), 17),
        ]
    );
}

#[test]
fn backtrack_preserves_line_numbers() {
    let tokens = lex("Shiftless\nCtrl+s => x");
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].kind, TokenKind::NewLine);
    assert_eq!((tokens[2].line, tokens[2].column), (2, 1));
    assert_eq!(tokens[2].kind, hotkey("Ctrl+s"));
}

#[test]
fn unknown_escape_passes_through() {
    let tokens = lex(r#""\q""#);
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].value, "\\q");
    assert_eq!(tokens[0].raw, "\\q");

    let tokens = lex(r#"'a\n\t\'b'"#);
    assert_eq!(tokens[0].value, "a\n\t'b");
    assert_eq!(tokens[0].raw, r"a\n\t\'b");
}

#[test]
fn let_binding_tokens() {
    let tokens = lex("let x = 5");
    assert_eq!(
        kinds("let x = 5"),
        vec![
            TokenKind::Let,
            TokenKind::Identifier,
            TokenKind::Equals,
            TokenKind::Number
        ]
    );
    assert_eq!(tokens[1].value, "x");
    assert_eq!(tokens[3].value, "5");
}

#[test]
fn subtraction_versus_negative_literal() {
    assert_eq!(
        kinds("x - 5"),
        vec![
            TokenKind::Identifier,
            TokenKind::BinaryOp(BinaryOp::Sub),
            TokenKind::Number
        ]
    );
    assert_eq!(kinds("x-5")[1], TokenKind::BinaryOp(BinaryOp::Sub));

    let tokens = lex("let x = -5");
    assert_eq!(tokens[3].kind, TokenKind::Number);
    assert_eq!(tokens[3].value, "-5");
    assert_eq!(tokens[3].value.parse::<f64>().unwrap(), -5.0);
}

#[test]
fn identifier_space_negative_is_a_literal() {
    // `a -5` folds the minus into the literal, so it is not a subtraction.
    let tokens = lex("a -5");
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].kind, TokenKind::Number);
    assert_eq!(tokens[1].value, "-5");
    assert!(matches!(Compiler::parse("a -5"), Err(ScriptError::Parse(_))));
}

#[test]
fn minus_after_call_or_group_subtracts() {
    assert!(Compiler::parse(r#"let n = text.len("abc")-1"#).is_ok());
    assert!(Compiler::parse("let m = (4)-1").is_ok());
    assert_eq!(kinds("f()-1")[3], TokenKind::BinaryOp(BinaryOp::Sub));
}

#[test]
fn hotkey_binding_tokens() {
    let tokens = lex(r#"Ctrl+Alt+t => send("hello")"#);
    assert_eq!(
        kinds(r#"Ctrl+Alt+t => send("hello")"#),
        vec![
            hotkey("Ctrl+Alt+t"),
            TokenKind::Arrow,
            TokenKind::Identifier,
            TokenKind::OpenParen,
            TokenKind::String,
            TokenKind::CloseParen,
        ]
    );
    assert_eq!(tokens[0].raw, "Ctrl+Alt+t");
    assert_eq!(tokens[2].value, "send");
    assert_eq!(tokens[4].value, "hello");
}

#[test]
fn builtin_names_are_plain_identifiers() {
    for name in ["clipboard", "send", "text", "window", "Send", "Alter", "Win32"] {
        assert_eq!(kinds(name), vec![TokenKind::Identifier], "{name}");
    }
}

#[test]
fn comments_advance_positions() {
    let tokens = lex("/* one\ntwo */ x // trailing\ny");
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!((tokens[0].line, tokens[0].column), (2, 8));
    assert_eq!(tokens[1].kind, TokenKind::NewLine);
    assert_eq!((tokens[2].line, tokens[2].column), (3, 1));
}
