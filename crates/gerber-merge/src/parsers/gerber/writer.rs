use std::io::Write;

use crate::error::MergeError;

use super::GerberDocument;

const GENERATOR_COMMENT: &str = "G04 gerber-merge*";

impl GerberDocument {
    /// Serialize back to RS-274X.
    ///
    /// Parameters come first (units, format, pass-through parameters,
    /// macros, then aperture descriptors), followed by every layer's code
    /// and its events. Coordinates are re-encoded at the declared format's
    /// resolution; finer precision is truncated.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), MergeError> {
        let (Some(units), Some(spec)) = (self.units, self.format) else {
            return Err(MergeError::MissingParameter {
                document: self.name.clone(),
                missing: "units or format".into(),
            });
        };

        writeln!(out, "{GENERATOR_COMMENT}")?;
        writeln!(out, "G75*")?;
        writeln!(out, "%MO{}*%", units.code())?;
        writeln!(
            out,
            "%FS{}AX{}{}Y{}{}*%",
            spec.zeros.code(),
            spec.x.integer_digits,
            spec.x.fractional_digits,
            spec.y.integer_digits,
            spec.y.fractional_digits
        )?;
        for param in &self.extra_params {
            writeln!(out, "%{}{}*%", param.code, param.blocks.join("*"))?;
        }
        for m in &self.aperture_macros {
            writeln!(out, "%AM{}*{}*%", m.name, m.body)?;
        }
        writeln!(out, "G01*")?;
        for (id, definition) in &self.aperture_descriptors {
            writeln!(out, "%ADD{id}{definition}*%")?;
        }
        write!(out, "\n\n")?;

        for layer in &self.layers {
            writeln!(out, "{}*", layer.mode)?;
            for event in &layer.events {
                writeln!(
                    out,
                    "X{}Y{}{}*",
                    spec.x.encode(event.x),
                    spec.y.encode(event.y),
                    event.code
                )?;
            }
        }
        write!(out, "M02*")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::super::GerberDocument;
    use crate::error::MergeError;

    const SOURCE: &str = "\
G04 made by hand*
%FSTAX24Y24*%
%MOMM*%
%LPD*%
%AMOC8*
5,1,8,0,0,1.08239X$1,22.5*%
%ADD11R,1.0X2.0*%
%ADD10C,0.5*%
D10*
X10000Y20000D02*
X-5000Y20000D01*
G36*
X0Y0D02*
X10000Y0D01*
G37*
D11*
X12500Y0D03*
M02*
";

    fn render(doc: &GerberDocument) -> String {
        let mut out = Vec::new();
        doc.write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_layout() {
        let doc = GerberDocument::parse("src", SOURCE).unwrap();
        let expected = "\
G04 gerber-merge*
G75*
%MOMM*%
%FSTAX24Y24*%
%LPD*%
%AMOC8*5,1,8,0,0,1.08239X$1,22.5*%
G01*
%ADD10C,0.5*%
%ADD11R,1.0X2.0*%


D10*
X10000Y20000D02*
X-5000Y20000D01*
G36*
X0Y0D02*
X10000Y0D01*
G37*
D11*
X12500Y0D03*
M02*";
        assert_eq!(render(&doc), expected);
    }

    #[test]
    fn test_output_parses_back() {
        let doc = GerberDocument::parse("src", SOURCE).unwrap();
        let again = GerberDocument::parse("src", &render(&doc)).unwrap();
        assert_eq!(again.aperture_descriptors, doc.aperture_descriptors);
        assert_eq!(again.aperture_macros, doc.aperture_macros);
        assert_eq!(again.extra_params, doc.extra_params);
        assert_eq!(again.layers, doc.layers);
    }

    #[test]
    fn test_write_after_translate_truncates() {
        let mut doc = GerberDocument::parse("src", SOURCE).unwrap();
        doc.translate(0.00005, 0.0);
        let again = GerberDocument::parse("src", &render(&doc)).unwrap();
        // 1.00005 is below the 4-digit resolution and is truncated to 1.0
        assert_abs_diff_eq!(again.layers[0].events[0].x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_write_keeps_fractional_digits() {
        let content = "%MOMM*%\n%FSTAX33Y33*%\n%ADD10C,0.1*%\nD10*\nX1001Y2003D02*\nX-7Y15999D01*\nM02*\n";
        let doc = GerberDocument::parse("fine", content).unwrap();
        let text = render(&doc);
        assert!(text.contains("\nX1001Y2003D02*\nX-7Y15999D01*\n"), "{text}");
    }

    #[test]
    fn test_write_requires_format() {
        let doc = GerberDocument::new("blank");
        let mut out = Vec::new();
        assert!(matches!(
            doc.write(&mut out),
            Err(MergeError::MissingParameter { .. })
        ));
    }
}
