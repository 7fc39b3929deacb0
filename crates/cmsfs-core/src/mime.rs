//! Extension to MIME type and icon mapping.
//!
//! The built-in table mirrors the list a stock CMS installation ships with.
//! Entries from the `[mime]` config section take precedence.

use std::collections::HashMap;

/// Returned for extensions that appear in neither table.
pub const DEFAULT_MIME: &str = "application/octet-stream";
pub const DEFAULT_ICON: &str = "iconPLAIN.svg";

/// `(extension, mime type, icon)`
const BUILTIN: &[(&str, &str, &str)] = &[
    // Application files
    ("xl", "application/excel", "iconOFFICE.svg"),
    ("xls", "application/excel", "iconOFFICE.svg"),
    ("hqx", "application/mac-binhex40", "iconPLAIN.svg"),
    ("cpt", "application/mac-compactpro", "iconPLAIN.svg"),
    ("bin", "application/macbinary", "iconPLAIN.svg"),
    ("doc", "application/msword", "iconOFFICE.svg"),
    ("word", "application/msword", "iconOFFICE.svg"),
    ("cto", "application/octet-stream", "iconCTO.svg"),
    ("dms", "application/octet-stream", "iconPLAIN.svg"),
    ("lha", "application/octet-stream", "iconPLAIN.svg"),
    ("lzh", "application/octet-stream", "iconPLAIN.svg"),
    ("exe", "application/octet-stream", "iconPLAIN.svg"),
    ("class", "application/octet-stream", "iconPLAIN.svg"),
    ("so", "application/octet-stream", "iconPLAIN.svg"),
    ("sea", "application/octet-stream", "iconPLAIN.svg"),
    ("dll", "application/octet-stream", "iconPLAIN.svg"),
    ("oda", "application/oda", "iconPLAIN.svg"),
    ("pdf", "application/pdf", "iconPDF.svg"),
    ("ai", "application/postscript", "iconPLAIN.svg"),
    ("eps", "application/postscript", "iconPLAIN.svg"),
    ("ps", "application/postscript", "iconPLAIN.svg"),
    ("pps", "application/powerpoint", "iconOFFICE.svg"),
    ("ppt", "application/powerpoint", "iconOFFICE.svg"),
    ("smi", "application/smil", "iconPLAIN.svg"),
    ("smil", "application/smil", "iconPLAIN.svg"),
    ("mif", "application/vnd.mif", "iconPLAIN.svg"),
    ("odc", "application/vnd.oasis.opendocument.chart", "iconOFFICE.svg"),
    ("odf", "application/vnd.oasis.opendocument.formula", "iconOFFICE.svg"),
    ("odg", "application/vnd.oasis.opendocument.graphics", "iconOFFICE.svg"),
    ("odi", "application/vnd.oasis.opendocument.image", "iconOFFICE.svg"),
    ("odp", "application/vnd.oasis.opendocument.presentation", "iconOFFICE.svg"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet", "iconOFFICE.svg"),
    ("odt", "application/vnd.oasis.opendocument.text", "iconOFFICE.svg"),
    ("wbxml", "application/wbxml", "iconPLAIN.svg"),
    ("wmlc", "application/wmlc", "iconPLAIN.svg"),
    ("dmg", "application/x-apple-diskimage", "iconRAR.svg"),
    ("dcr", "application/x-director", "iconPLAIN.svg"),
    ("dir", "application/x-director", "iconPLAIN.svg"),
    ("dxr", "application/x-director", "iconPLAIN.svg"),
    ("dvi", "application/x-dvi", "iconPLAIN.svg"),
    ("gtar", "application/x-gtar", "iconRAR.svg"),
    ("inc", "application/x-httpd-php", "iconPHP.svg"),
    ("php", "application/x-httpd-php", "iconPHP.svg"),
    ("php3", "application/x-httpd-php", "iconPHP.svg"),
    ("php4", "application/x-httpd-php", "iconPHP.svg"),
    ("php5", "application/x-httpd-php", "iconPHP.svg"),
    ("phtml", "application/x-httpd-php", "iconPHP.svg"),
    ("phps", "application/x-httpd-php-source", "iconPHP.svg"),
    ("js", "application/x-javascript", "iconJS.svg"),
    ("psd", "application/x-photoshop", "iconPLAIN.svg"),
    ("rar", "application/x-rar", "iconRAR.svg"),
    ("fla", "application/x-shockwave-flash", "iconSWF.svg"),
    ("swf", "application/x-shockwave-flash", "iconSWF.svg"),
    ("sit", "application/x-stuffit", "iconRAR.svg"),
    ("tar", "application/x-tar", "iconRAR.svg"),
    ("tgz", "application/x-tar", "iconRAR.svg"),
    ("xhtml", "application/xhtml+xml", "iconPLAIN.svg"),
    ("xht", "application/xhtml+xml", "iconPLAIN.svg"),
    ("zip", "application/zip", "iconRAR.svg"),
    // Audio files
    ("m4a", "audio/x-m4a", "iconM4A.svg"),
    ("mp3", "audio/mp3", "iconMP3.svg"),
    ("wma", "audio/wma", "iconWMA.svg"),
    ("mpeg", "audio/mpeg", "iconMPEG.svg"),
    ("wav", "audio/wav", "iconWAV.svg"),
    ("ogg", "audio/ogg", "iconOGG.svg"),
    ("mid", "audio/midi", "iconMID.svg"),
    ("midi", "audio/midi", "iconMID.svg"),
    ("aif", "audio/x-aiff", "iconAIF.svg"),
    ("aiff", "audio/x-aiff", "iconAIF.svg"),
    ("aifc", "audio/x-aiff", "iconAIF.svg"),
    ("ram", "audio/x-pn-realaudio", "iconRAM.svg"),
    ("rm", "audio/x-pn-realaudio", "iconRAM.svg"),
    ("rpm", "audio/x-pn-realaudio-plugin", "iconRPM.svg"),
    ("ra", "audio/x-realaudio", "iconRA.svg"),
    // Images
    ("bmp", "image/bmp", "iconBMP.svg"),
    ("gif", "image/gif", "iconGIF.svg"),
    ("jpeg", "image/jpeg", "iconJPEG.svg"),
    ("jpg", "image/jpeg", "iconJPG.svg"),
    ("jpe", "image/jpeg", "iconJPE.svg"),
    ("png", "image/png", "iconTIF.svg"),
    ("tiff", "image/tiff", "iconTIF.svg"),
    ("tif", "image/tiff", "iconTIF.svg"),
    ("svg", "image/svg+xml", "iconSVG.svg"),
    ("svgz", "image/svg+xml", "iconSVG.svg"),
    ("webp", "image/webp", "iconWEBP.svg"),
    // Mailbox files
    ("eml", "message/rfc822", "iconEML.svg"),
    // Text files
    ("asp", "text/asp", "iconASP.svg"),
    ("css", "text/css", "iconCSS.svg"),
    ("scss", "text/x-scss", "iconCSS.svg"),
    ("less", "text/x-less", "iconCSS.svg"),
    ("html", "text/html", "iconHTML.svg"),
    ("htm", "text/html", "iconHTML.svg"),
    ("shtml", "text/html", "iconHTML.svg"),
    ("txt", "text/plain", "iconTXT.svg"),
    ("text", "text/plain", "iconTXT.svg"),
    ("log", "text/plain", "iconTXT.svg"),
    ("rtx", "text/richtext", "iconTXT.svg"),
    ("rtf", "text/rtf", "iconTXT.svg"),
    ("xml", "text/xml", "iconXML.svg"),
    ("xsl", "text/xml", "iconXML.svg"),
    ("csv", "text/comma-separated-values", "iconCSV.svg"),
    // Videos
    ("mp4", "video/mp4", "iconMP4.svg"),
    ("m4v", "video/x-m4v", "iconM4V.svg"),
    ("mov", "video/mov", "iconMOV.svg"),
    ("wmv", "video/wmv", "iconWMV.svg"),
    ("webm", "video/webm", "iconWEBM.svg"),
    ("qt", "video/quicktime", "iconQT.svg"),
    ("rv", "video/vnd.rn-realvideo", "iconRV.svg"),
    ("avi", "video/x-msvideo", "iconAVI.svg"),
    ("ogv", "video/ogg", "iconOGV.svg"),
    ("movie", "video/x-sgi-movie", "iconMOVIE.svg"),
];

/// MIME type and icon resolved for one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeInfo<'a> {
    pub mime: &'a str,
    pub icon: &'a str,
}

/// Built-in table plus configured overrides.
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    overrides: HashMap<String, (String, String)>,
}

impl MimeTable {
    /// Creates a table with additional entries. Keys are matched
    /// case-insensitively and shadow built-in entries.
    pub fn with_overrides(overrides: HashMap<String, (String, String)>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(ext, entry)| (ext.to_lowercase(), entry))
            .collect();
        Self { overrides }
    }

    /// Looks up `extension` (without the leading dot).
    ///
    /// Unknown extensions resolve to [`DEFAULT_MIME`] / [`DEFAULT_ICON`].
    pub fn lookup(&self, extension: &str) -> MimeInfo<'_> {
        let ext = extension.to_lowercase();

        if let Some((mime, icon)) = self.overrides.get(&ext) {
            return MimeInfo { mime, icon };
        }

        BUILTIN
            .iter()
            .find(|(e, _, _)| *e == ext)
            .map(|(_, mime, icon)| MimeInfo { mime, icon })
            .unwrap_or(MimeInfo {
                mime: DEFAULT_MIME,
                icon: DEFAULT_ICON,
            })
    }
}
